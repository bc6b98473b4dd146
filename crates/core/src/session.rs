use crate::domain::user::{SessionUser, UserProfile, UserProfileRecord};
use crate::storage::results::ResultStore;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub type SessionCallback = Box<dyn Fn(Option<&SessionUser>) + Send + Sync>;

/// Signed-in user as seen by the rest of the application, independent of the identity
/// provider that produced it.
pub trait SessionState: Send + Sync {
    fn current_user(&self) -> Option<SessionUser>;

    /// Registers `on_change`; it is called once right away with the current user and
    /// again after every sign-in or sign-out until the returned handle is dropped.
    fn subscribe(&self, on_change: SessionCallback) -> Subscription;
}

/// Detaches its listener when dropped or explicitly unsubscribed.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

#[derive(Default)]
struct LocalSessionInner {
    user: Mutex<Option<SessionUser>>,
    listeners: Mutex<BTreeMap<u64, Arc<dyn Fn(Option<&SessionUser>) + Send + Sync>>>,
    next_id: AtomicU64,
}

/// In-process session fed by whatever identity-provider adapter sits in front of it.
#[derive(Clone, Default)]
pub struct LocalSession {
    inner: Arc<LocalSessionInner>,
}

impl LocalSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user: SessionUser) {
        tracing::info!(uid = %user.uid, "session signed in");
        self.replace(Some(user));
    }

    pub fn sign_out(&self) {
        tracing::info!("session signed out");
        self.replace(None);
    }

    fn replace(&self, user: Option<SessionUser>) {
        if let Ok(mut current) = self.inner.user.lock() {
            *current = user.clone();
        }
        // Call listeners outside the lock so they may read the session again.
        let listeners: Vec<_> = match self.inner.listeners.lock() {
            Ok(listeners) => listeners.values().cloned().collect(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(user.as_ref());
        }
    }
}

impl SessionState for LocalSession {
    fn current_user(&self) -> Option<SessionUser> {
        self.inner.user.lock().ok().and_then(|u| u.clone())
    }

    fn subscribe(&self, on_change: SessionCallback) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: Arc<dyn Fn(Option<&SessionUser>) + Send + Sync> = Arc::from(on_change);
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.insert(id, listener.clone());
        }
        listener(self.current_user().as_ref());

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                if let Ok(mut listeners) = inner.listeners.lock() {
                    listeners.remove(&id);
                }
            }
        })
    }
}

/// Loads the profile for a freshly signed-in user, creating it on first sign-in.
pub async fn ensure_user_profile(
    store: &ResultStore,
    user: &SessionUser,
) -> anyhow::Result<UserProfile> {
    anyhow::ensure!(!user.uid.trim().is_empty(), "user id must be non-empty");

    if let Some(profile) = store.get_user(&user.uid).await? {
        return Ok(profile);
    }

    let profile = store.create_user(&UserProfileRecord::from(user)).await?;
    tracing::info!(uid = %user.uid, "created user profile");
    Ok(profile)
}
