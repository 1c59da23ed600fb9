use log::{debug, info, warn};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::api::EquipmentApi;
use crate::errors::{AuthOperation, ClassifiedError, ErrorCategory, classify_auth};
use crate::models::{Credential, LoginRequest, RegisterRequest};
use crate::notify::{Notice, Notifier};

/// Views of the client that navigation can lead to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Login / registration, reachable without a credential
    Entry,
    /// The protected dataset dashboard
    Dashboard,
}

/// Instruction to leave the current view
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Redirect {
    pub to: Route,
}

impl Redirect {
    pub fn to_entry() -> Self {
        Redirect { to: Route::Entry }
    }
}

/// Backing storage for the token between runs
pub trait TokenStore: Send + Sync {
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, token: &str) -> io::Result<()>;
    fn remove(&self) -> io::Result<()>;
}

/// Keeps the token for the life of the process only
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> io::Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Keeps the token in a plain file, e.g. `token.txt`
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileTokenStore { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        fs::write(&self.path, token)
    }

    fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// The credential shared by everything that issues protected requests
///
/// Cloning yields another handle to the same state. Components receive a
/// `Session` explicitly; nothing looks the credential up globally.
#[derive(Clone)]
pub struct Session {
    credential: Arc<RwLock<Option<Credential>>>,
    store: Arc<dyn TokenStore>,
    /// Bumped on every login and logout
    generation: Arc<AtomicU64>,
}

impl Session {
    /// A session that forgets the credential when the process ends
    pub fn transient() -> Self {
        Self::restore(Arc::new(MemoryTokenStore::default()))
    }

    /// Start from whatever token the store holds
    ///
    /// # Arguments
    /// * `store` - Token storage to read now and write through to later
    ///
    /// # Returns
    /// * `Session` - Authenticated if a token was found, otherwise empty.
    ///   A store that cannot be read counts as empty.
    pub fn restore(store: Arc<dyn TokenStore>) -> Self {
        let credential = match store.load() {
            Ok(token) => token.map(Credential::new),
            Err(e) => {
                warn!("could not read stored token: {}", e);
                None
            }
        };
        Session {
            credential: Arc::new(RwLock::new(credential)),
            store,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn get(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, credential: Credential) {
        if let Err(e) = self.store.save(credential.as_str()) {
            warn!("could not persist token: {}", e);
        }
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Forget the credential; harmless when there is none
    pub fn clear(&self) {
        if let Err(e) = self.store.remove() {
            warn!("could not remove stored token: {}", e);
        }
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Changes whenever the credential is set or cleared
    ///
    /// State derived from one generation belongs to that login only.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }

    /// Gate for protected views: the credential, or a redirect to the entry view
    pub fn require(&self) -> Result<Credential, Redirect> {
        self.get().ok_or_else(|| {
            debug!("no credential held, redirecting to entry");
            Redirect::to_entry()
        })
    }
}

/// Result of a successful login
#[derive(Clone, Debug, PartialEq)]
pub struct Authenticated {
    pub credential: Credential,
    pub next: Route,
}

/// Login, registration and logout against the authentication service
pub struct SessionManager {
    api: Arc<dyn EquipmentApi>,
    session: Session,
    notifier: Arc<dyn Notifier>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn EquipmentApi>, session: Session, notifier: Arc<dyn Notifier>) -> Self {
        SessionManager {
            api,
            session,
            notifier,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn fail(&self, err: ClassifiedError) -> ClassifiedError {
        self.notifier.notify(Notice::Error(err.clone()));
        err
    }

    /// Log in and keep the returned credential
    ///
    /// On failure the session is left exactly as it was.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Authenticated, ClassifiedError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(self.fail(missing_fields()));
        }

        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self
            .api
            .login(&request)
            .await
            .map_err(|failure| self.fail(classify_auth(AuthOperation::Login, &failure)))?;

        let credential = Credential::new(response.token);
        self.session.set(credential.clone());
        info!("logged in as {}", username);
        self.notifier
            .notify(Notice::Success("Login successful!".to_string()));

        Ok(Authenticated {
            credential,
            next: Route::Dashboard,
        })
    }

    /// Register a new account
    ///
    /// Does not log in; the caller is sent back to the entry view.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Route, ClassifiedError> {
        if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(self.fail(missing_fields()));
        }

        let request = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        self.api
            .register(&request)
            .await
            .map_err(|failure| self.fail(classify_auth(AuthOperation::Register, &failure)))?;

        info!("registered {}", username);
        self.notifier.notify(Notice::Success(
            "Registration successful! Please login.".to_string(),
        ));
        Ok(Route::Entry)
    }

    pub fn require_session(&self) -> Result<Credential, Redirect> {
        self.session.require()
    }

    /// Always clears, whether or not a credential was held
    pub fn logout(&self) -> Redirect {
        self.session.clear();
        info!("logged out");
        Redirect::to_entry()
    }
}

fn missing_fields() -> ClassifiedError {
    ClassifiedError::new(ErrorCategory::AuthValidationOther, "Please fill all fields")
}
