//! Session manager: the one owner of authentication state.
//!
//! State lives here and nowhere else; the credential itself lives only in the
//! [`CredentialStore`]. Every transition is published synchronously to the
//! current subscribers, in subscription order, once per transition.
//! Transitions are queued in commit order while the state lock is held and
//! delivered by one caller at a time, outside every lock.
//!
//! A generation counter is advanced by every logout, login and forced
//! invalidation. Network work captures the generation before suspending and
//! its result is dropped if the generation moved in the meantime.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::config::{endpoints, Config};
use crate::error::{ErrorKind, GatewayError};
use crate::models::{AdminFlag, GatewayRequest, Session, SessionState, TokenResponse, User};
use crate::services::credential_store::{fingerprint, CredentialStore, FileMedium, MemoryMedium};
use crate::services::gateway::GatewayClient;

pub type Subscriber = Arc<dyn Fn(&Session) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Core {
    session: Session,
    generation: u64,
    pending: VecDeque<Session>,
    draining: bool,
}

struct Inner {
    store: CredentialStore,
    gateway: GatewayClient,
    core: Mutex<Core>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicU64,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Wraps a gateway client; its credential store becomes the session's store
    /// and its 401/403 signal becomes a forced invalidation.
    pub fn new(gateway: GatewayClient) -> Self {
        let inner = Arc::new(Inner {
            store: gateway.credentials().clone(),
            gateway,
            core: Mutex::new(Core {
                session: Session::unknown(),
                generation: 0,
                pending: VecDeque::new(),
                draining: false,
            }),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        });

        let weak: Weak<Inner> = Arc::downgrade(&inner);
        inner.gateway.set_unauthorized_hook(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                SessionManager { inner }.invalidate();
            }
        }));

        Self { inner }
    }

    /// File-backed credentials when `credential_file` is set, process memory otherwise
    pub fn from_config(config: &Config) -> Self {
        let store = match &config.credential_file {
            Some(path) => CredentialStore::with_medium(FileMedium::new(path)),
            None => CredentialStore::with_medium(MemoryMedium::new()),
        };
        Self::new(GatewayClient::from_config(config, store))
    }

    pub fn gateway(&self) -> &GatewayClient {
        &self.inner.gateway
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.store
    }

    pub fn snapshot(&self) -> Session {
        self.lock_core().session.clone()
    }

    pub fn state(&self) -> SessionState {
        self.lock_core().session.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock_core().session.is_authenticated()
    }

    pub fn subscribe(&self, callback: impl Fn(&Session) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.lock_subscribers().push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock_subscribers();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    /// Reads the credential store the first time; later calls are no-ops
    pub fn rehydrate(&self) -> Session {
        let change = {
            let mut core = self.lock_core();
            if core.session.state != SessionState::Unknown {
                return core.session.clone();
            }
            let next = match self.inner.store.get() {
                Some(token) => {
                    tracing::info!("Sessione ripristinata ({})", fingerprint(&token));
                    Session::authenticated()
                }
                None => Session::anonymous(),
            };
            Self::replace(&mut core, next)
        };
        self.publish(change)
    }

    /// Exchanges username/password for a token and persists it
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, GatewayError> {
        self.rehydrate();
        let generation = self.generation();

        let request = GatewayRequest::post(endpoints::LOGIN_TOKEN)
            .form(&[("username", username), ("password", password)])
            .without_invalidation();

        let token = match self.inner.gateway.request_as::<TokenResponse>(request).await {
            Ok(response) if !response.access_token.is_empty() => response.access_token,
            Ok(_) => {
                return Err(GatewayError::new(
                    ErrorKind::ProtocolError,
                    "Login response without access token",
                ))
            }
            Err(err) => {
                tracing::warn!("Login fallito per '{}': {}", username, err);
                return Err(login_failure(err));
            }
        };

        let change = {
            let mut core = self.lock_core();
            if core.generation != generation {
                tracing::info!("Login di '{}' scartato: sessione chiusa nel frattempo", username);
                return Err(GatewayError::unauthorized("Sign-in cancelled by logout"));
            }
            if let Err(e) = self.inner.store.try_set(&token) {
                tracing::warn!("Login di '{}' non persistito: {}", username, e);
                return Err(GatewayError::new(
                    ErrorKind::StorageUnavailable,
                    format!("Credential could not be saved: {}", e),
                ));
            }
            core.generation += 1;
            tracing::info!("Login riuscito per '{}' ({})", username, fingerprint(&token));
            Self::replace(&mut core, Session::authenticated())
        };
        Ok(self.publish(change))
    }

    /// Clears the credential and moves to `Anonymous`
    pub fn logout(&self) -> Session {
        self.rehydrate();
        let change = {
            let mut core = self.lock_core();
            core.generation += 1;
            self.inner.store.clear();
            Self::replace(&mut core, Session::anonymous())
        };
        self.publish(change)
    }

    /// Forced invalidation after the backend rejected the credential.
    /// Also acts before rehydration, since the gateway reads the store directly.
    /// An anonymous session is left alone, so concurrent 401s collapse into one transition.
    pub fn invalidate(&self) {
        let change = {
            let mut core = self.lock_core();
            if core.session.state == SessionState::Anonymous {
                return;
            }
            core.generation += 1;
            self.inner.store.clear();
            tracing::info!("Credenziale rifiutata dal backend, sessione invalidata");
            Self::replace(&mut core, Session::anonymous())
        };
        self.publish(change);
    }

    /// Fetches the profile of the signed-in user
    pub async fn current_user(&self) -> Result<User, GatewayError> {
        self.inner
            .gateway
            .request_as(GatewayRequest::get(endpoints::CURRENT_USER))
            .await
    }

    /// Fetches the admin flag of the signed-in user
    pub async fn is_admin(&self) -> Result<bool, GatewayError> {
        self.inner
            .gateway
            .request_as::<AdminFlag>(GatewayRequest::get(endpoints::IS_ADMIN))
            .await
            .map(AdminFlag::is_admin)
    }

    /// Resolves profile and role. On failure the session keeps its current
    /// state and role fields and the error goes back to the caller.
    pub async fn resolve(&self) -> Result<Session, GatewayError> {
        self.rehydrate();
        if !self.is_authenticated() {
            return Err(GatewayError::unauthorized("No active session"));
        }
        let generation = self.generation();

        let (user, admin) = tokio::join!(self.current_user(), self.is_admin());
        let (user, is_admin) = (user?, admin?);

        let change = {
            let mut core = self.lock_core();
            if core.generation != generation || !core.session.is_authenticated() {
                return Ok(core.session.clone());
            }
            Self::replace(
                &mut core,
                Session {
                    state: SessionState::Resolved,
                    user: Some(user),
                    is_admin,
                },
            )
        };
        Ok(self.publish(change))
    }

    fn generation(&self) -> u64 {
        self.lock_core().generation
    }

    fn lock_core(&self) -> std::sync::MutexGuard<'_, Core> {
        self.inner.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Subscriber)>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Swaps in the next session and queues its notification when it differs from the previous one
    fn replace(core: &mut Core, next: Session) -> Transition {
        if core.session == next {
            return Transition::Unchanged(next);
        }
        tracing::info!("Sessione: {:?} -> {:?}", core.session.state, next.state);
        core.session = next.clone();
        core.pending.push_back(next.clone());
        Transition::Changed(next)
    }

    /// Delivers queued transitions outside of every lock. Only one caller
    /// drains at a time; a transition committed meanwhile (even from inside a
    /// callback) is delivered by the active drainer, after the ones before it.
    fn publish(&self, transition: Transition) -> Session {
        match transition {
            Transition::Unchanged(session) => session,
            Transition::Changed(session) => {
                self.drain_pending();
                session
            }
        }
    }

    fn drain_pending(&self) {
        {
            let mut core = self.lock_core();
            if core.draining {
                return;
            }
            core.draining = true;
        }
        let _unwind = DrainGuard(self);

        loop {
            let next = {
                let mut core = self.lock_core();
                match core.pending.pop_front() {
                    Some(session) => session,
                    None => {
                        core.draining = false;
                        return;
                    }
                }
            };

            let subscribers: Vec<Subscriber> = self
                .lock_subscribers()
                .iter()
                .map(|(_, callback)| callback.clone())
                .collect();
            for callback in subscribers {
                callback(&next);
            }
        }
    }
}

/// Releases the drain slot if a subscriber panics
struct DrainGuard<'a>(&'a SessionManager);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock_core().draining = false;
        }
    }
}

enum Transition {
    Changed(Session),
    Unchanged(Session),
}

/// Any rejected credential exchange is an authorization failure; transport
/// problems keep their own classification.
fn login_failure(err: GatewayError) -> GatewayError {
    match err.kind {
        ErrorKind::Unauthorized | ErrorKind::BackendError => GatewayError {
            kind: ErrorKind::Unauthorized,
            ..err
        },
        _ => err,
    }
}
