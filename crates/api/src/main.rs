use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use altrisk_core::domain::analysis::AnalysisOutcome;
use altrisk_core::domain::user::{SessionUser, UserProfile};
use altrisk_core::ingest::mock::MockAlternativeData;
use altrisk_core::llm::anthropic::AnthropicClient;
use altrisk_core::pipeline::AnalysisPipeline;
use altrisk_core::storage::memory::MemoryDocumentStore;
use altrisk_core::storage::postgres::PgDocumentStore;
use altrisk_core::storage::results::ResultStore;
use altrisk_core::view::{load_analysis_view, AnalysisView, ViewError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = altrisk_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let store = connect_store(&settings).await;

    let pipeline = match (&store, AnthropicClient::from_settings(&settings)) {
        (Some(store), Ok(llm)) => Some(AnalysisPipeline::new(
            store.clone(),
            Arc::new(llm),
            Arc::new(MockAlternativeData),
        )),
        (_, Err(e)) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "LLM client unavailable; analysis runs disabled");
            None
        }
        (None, Ok(_)) => None,
    };

    let state = AppState { store, pipeline };

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Postgres when configured, otherwise a seeded in-memory store. A configured database
/// that cannot be reached leaves the API in degraded mode instead.
async fn connect_store(settings: &altrisk_core::config::Settings) -> Option<ResultStore> {
    let db_url = match settings.require_database_url() {
        Ok(db_url) => db_url,
        Err(e) => {
            tracing::warn!(error = %e, "using in-memory document store");
            let store = ResultStore::new(Arc::new(MemoryDocumentStore::new()));
            if let Err(e) = altrisk_core::storage::reference::seed_reference_data(&store).await {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "seeding in-memory store failed");
            }
            return Some(store);
        }
    };

    match sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
    {
        Ok(pool) => match altrisk_core::storage::migrate(&pool).await {
            Ok(()) => Some(ResultStore::new(Arc::new(PgDocumentStore::new(pool)))),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
            None
        }
    }
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/actions/run-analysis", post(run_analysis))
        .route("/analysis/:id", get(get_analysis))
        .route("/session", post(ensure_session))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    store: Option<ResultStore>,
    pipeline: Option<AnalysisPipeline>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunAnalysisBody {
    #[serde(default)]
    user_id: String,
}

async fn run_analysis(
    State(state): State<AppState>,
    Json(body): Json<RunAnalysisBody>,
) -> Result<Json<AnalysisOutcome>, StatusCode> {
    let Some(pipeline) = &state.pipeline else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    Ok(Json(pipeline.run_analysis(&body.user_id).await))
}

async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisView>, StatusCode> {
    let Some(store) = &state.store else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    match load_analysis_view(store, &id).await {
        Ok(view) => Ok(Json(view)),
        Err(ViewError::NotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(ViewError::Store(e)) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(analysis_id = %id, error = %e, "analysis read failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn ensure_session(
    State(state): State<AppState>,
    Json(user): Json<SessionUser>,
) -> Result<Json<UserProfile>, StatusCode> {
    let Some(store) = &state.store else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };
    if user.uid.trim().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let profile = altrisk_core::session::ensure_user_profile(store, &user)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(profile))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &altrisk_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use altrisk_core::llm::error::LlmError;
    use altrisk_core::llm::{LlmClient, Provider, StructuredRequest};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct CannedLlm;

    #[async_trait::async_trait]
    impl LlmClient for CannedLlm {
        fn provider(&self) -> Provider {
            Provider::Other("canned")
        }

        async fn complete_structured(&self, request: StructuredRequest) -> Result<Value, LlmError> {
            Ok(match request.name {
                "generateRiskLevel" => json!({
                    "riskLevel": "High",
                    "confidenceScore": 0.9,
                    "keyDrivers": ["ESG"],
                    "explanation": "Coal exposure.",
                }),
                _ => json!({"aggregatedReasons": "Mostly ESG."}),
            })
        }
    }

    async fn state() -> AppState {
        let store = ResultStore::new(Arc::new(MemoryDocumentStore::new()));
        altrisk_core::storage::reference::seed_reference_data(&store)
            .await
            .unwrap();
        let pipeline = AnalysisPipeline::new(
            store.clone(),
            Arc::new(CannedLlm),
            Arc::new(MockAlternativeData),
        );
        AppState {
            store: Some(store),
            pipeline: Some(pipeline),
        }
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn run_then_view_report() {
        let app = app(state().await);

        let (status, outcome) = send(
            app.clone(),
            post_json("/actions/run-analysis", json!({"userId": "user-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["success"], true);
        let id = outcome["analysisId"].as_str().unwrap().to_string();

        let (status, view) = send(
            app,
            Request::get(format!("/analysis/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["kind"], "report");
        assert_eq!(view["riskLevel"], "High");
        assert_eq!(view["entity"], "Adani Power");
    }

    #[tokio::test]
    async fn missing_user_id_is_reported_in_outcome() {
        let (status, outcome) = send(
            app(state().await),
            post_json("/actions/run-analysis", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            outcome,
            json!({"success": false, "error": "User is not authenticated."})
        );
    }

    #[tokio::test]
    async fn unknown_analysis_is_404() {
        let (status, _) = send(
            app(state().await),
            Request::get("/analysis/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn degraded_mode_is_503() {
        let app = app(AppState {
            store: None,
            pipeline: None,
        });
        let (status, _) = send(
            app,
            post_json("/actions/run-analysis", json!({"userId": "user-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn session_creates_profile_once() {
        let app = app(state().await);
        let body = json!({
            "uid": "user-1",
            "email": "a@example.com",
            "displayName": "A",
            "photoURL": null,
        });

        let (status, first) = send(app.clone(), post_json("/session", body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["id"], "user-1");
        assert_eq!(first["name"], "A");

        let (_, second) = send(app, post_json("/session", body)).await;
        assert_eq!(first["createdAt"], second["createdAt"]);
    }
}
