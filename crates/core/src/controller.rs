use crate::config::Settings;
use crate::domain::analysis::AnalysisOutcome;
use crate::pipeline::AnalysisPipeline;
use crate::session::SessionState;
use anyhow::Context;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const ERROR_RESET_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Running,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    AuthenticationError,
    AnalysisComplete,
    AnalysisFailed(String),
}

impl Notification {
    pub fn title(&self) -> &'static str {
        match self {
            Self::AuthenticationError => "Authentication Error",
            Self::AnalysisComplete => "Analysis Complete",
            Self::AnalysisFailed(_) => "Analysis Failed",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::AuthenticationError => "You must be signed in to run an analysis.",
            Self::AnalysisComplete => "Redirecting to the results page.",
            Self::AnalysisFailed(message) => message,
        }
    }
}

/// Whatever executes `runAnalysis` on behalf of the controller.
#[async_trait::async_trait]
pub trait AnalysisRunner: Send + Sync {
    async fn run_analysis(&self, user_id: &str) -> anyhow::Result<AnalysisOutcome>;
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

#[async_trait::async_trait]
impl AnalysisRunner for AnalysisPipeline {
    async fn run_analysis(&self, user_id: &str) -> anyhow::Result<AnalysisOutcome> {
        Ok(AnalysisPipeline::run_analysis(self, user_id).await)
    }
}

/// Calls the action endpoint of a remote API.
#[derive(Debug, Clone)]
pub struct HttpAnalysisRunner {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunAnalysisRequest<'a> {
    user_id: &'a str,
}

impl HttpAnalysisRunner {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings.require_api_base_url()?.to_string();
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { http, base_url })
    }

    fn url(&self) -> String {
        format!("{}/actions/run-analysis", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl AnalysisRunner for HttpAnalysisRunner {
    async fn run_analysis(&self, user_id: &str) -> anyhow::Result<AnalysisOutcome> {
        let res = self
            .http
            .post(self.url())
            .json(&RunAnalysisRequest { user_id })
            .send()
            .await
            .context("runAnalysis request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read runAnalysis response")?;
        if !status.is_success() {
            anyhow::bail!("runAnalysis HTTP {status}: {text}");
        }

        serde_json::from_str::<AnalysisOutcome>(&text)
            .with_context(|| format!("unexpected runAnalysis response: {text}"))
    }
}

/// Button-side state machine: idle -> running -> success | error, with error falling
/// back to idle after [`ERROR_RESET_DELAY`]. At most one run is in flight.
pub struct TriggerController {
    runner: Arc<dyn AnalysisRunner>,
    session: Arc<dyn SessionState>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    state: Arc<watch::Sender<TriggerState>>,
    error_epoch: Arc<AtomicU64>,
    reset_delay: Duration,
}

impl TriggerController {
    pub fn new(
        runner: Arc<dyn AnalysisRunner>,
        session: Arc<dyn SessionState>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (state, _) = watch::channel(TriggerState::Idle);
        Self {
            runner,
            session,
            navigator,
            notifier,
            state: Arc::new(state),
            error_epoch: Arc::new(AtomicU64::new(0)),
            reset_delay: ERROR_RESET_DELAY,
        }
    }

    pub fn state(&self) -> TriggerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TriggerState> {
        self.state.subscribe()
    }

    /// The trigger control is disabled while a run is in flight.
    pub fn is_enabled(&self) -> bool {
        self.state() != TriggerState::Running
    }

    /// Handles one press of the trigger and returns the state it leaves behind.
    pub async fn trigger(&self) -> TriggerState {
        let Some(user) = self.session.current_user() else {
            self.notifier.notify(Notification::AuthenticationError);
            return self.state();
        };

        let started = self.state.send_if_modified(|state| {
            if *state == TriggerState::Running {
                return false;
            }
            *state = TriggerState::Running;
            true
        });
        if !started {
            tracing::debug!(uid = %user.uid, "analysis already running; ignoring trigger");
            return TriggerState::Running;
        }

        match self.runner.run_analysis(&user.uid).await {
            Ok(AnalysisOutcome {
                success: true,
                analysis_id: Some(analysis_id),
                ..
            }) => {
                self.state.send_replace(TriggerState::Success);
                self.notifier.notify(Notification::AnalysisComplete);
                self.navigator.navigate(&format!("/analysis/{analysis_id}"));
                TriggerState::Success
            }
            Ok(outcome) => {
                let message = outcome
                    .error
                    .unwrap_or_else(|| "Analysis failed to start.".to_string());
                self.fail(message)
            }
            Err(err) => self.fail(format!("{err:#}")),
        }
    }

    fn fail(&self, message: String) -> TriggerState {
        tracing::warn!(error = %message, "analysis trigger failed");
        let epoch = self.error_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(TriggerState::Error);
        self.notifier.notify(Notification::AnalysisFailed(message));

        let state = self.state.clone();
        let error_epoch = self.error_epoch.clone();
        let delay = self.reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Only the most recent error may reset, and only if nothing else happened since.
            if error_epoch.load(Ordering::SeqCst) != epoch {
                return;
            }
            state.send_if_modified(|s| {
                if *s != TriggerState::Error {
                    return false;
                }
                *s = TriggerState::Idle;
                true
            });
        });

        TriggerState::Error
    }
}
