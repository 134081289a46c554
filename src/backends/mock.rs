//! Mock backend for testing.
//!
//! This backend provides a complete in-memory implementation with error
//! injection capabilities for testing code that uses usermux. Accounts
//! live in a shared map and home directories in a pseudo-filesystem set,
//! both reachable through handles after the backend has been boxed, so
//! tests can assert on end state and on the exact call sequence.

use crate::*;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One stored account record.
#[derive(Debug, Clone)]
pub struct MockAccount {
    pub identity: AccountIdentity,
    pub credential: Option<Credential>,
    pub locked: bool,
}

/// Shared account storage, inspectable after the backend is boxed.
pub type MockState = Arc<RwLock<HashMap<String, MockAccount>>>;

/// Mock backend for testing.
///
/// Stores all data in memory with support for error injection to simulate
/// failure conditions. Each injection field, when set, makes the matching
/// method return that error instead of touching state.
///
/// # Example
///
/// ```
/// use usermux::backends::mock::MockBackend;
/// use usermux::{AccountBackend, AccountSpec, UsermuxError};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> usermux::Result<()> {
///     let mut backend = MockBackend::new();
///     backend.probe().await?;
///
///     let spec = AccountSpec::new("alice").with_credential("pw");
///     backend.create_account(&spec).await?;
///     assert!(backend.exists("alice").await?);
///
///     // Simulate an unreachable account store
///     backend.lookup_error = Some(UsermuxError::BackendUnavailable("down".to_string()));
///     assert!(backend.lookup("alice").await.is_err());
///
///     Ok(())
/// }
/// ```
pub struct MockBackend {
    accounts: MockState,
    homes: Arc<RwLock<HashSet<PathBuf>>>,
    calls: Arc<RwLock<Vec<String>>>,

    /// Error to return from `probe()`
    pub probe_error: Option<UsermuxError>,
    /// Error to return from `lookup()` (and `exists()`, which rides on it)
    pub lookup_error: Option<UsermuxError>,
    /// Error to return from `enumerate()`
    pub enumerate_error: Option<UsermuxError>,
    /// Error to return from `create_account()`
    pub create_error: Option<UsermuxError>,
    /// Error to return from `delete_account()`
    pub delete_error: Option<UsermuxError>,
    /// Error to return from `set_credential()`
    pub set_credential_error: Option<UsermuxError>,
    /// Error to return from `lock_credential()`
    pub lock_credential_error: Option<UsermuxError>,
    /// Error to return from `ensure_home()`
    pub ensure_home_error: Option<UsermuxError>,
    /// Error to return from `remove_home()`
    pub remove_home_error: Option<UsermuxError>,
}

/// Re-raises an injected error without consuming it.
///
/// Taxonomy variants survive intact so callers can match on them; anything
/// non-clonable degrades to a stringated catch-all.
fn clone_injected(err: &UsermuxError) -> UsermuxError {
    match err {
        UsermuxError::AlreadyExists(s) => UsermuxError::AlreadyExists(s.clone()),
        UsermuxError::NotFound(s) => UsermuxError::NotFound(s.clone()),
        UsermuxError::PermissionDenied(s) => UsermuxError::PermissionDenied(s.clone()),
        UsermuxError::InvalidName(s) => UsermuxError::InvalidName(s.clone()),
        UsermuxError::InvalidCredential(s) => UsermuxError::InvalidCredential(s.clone()),
        UsermuxError::PolicyRejected(s) => UsermuxError::PolicyRejected(s.clone()),
        UsermuxError::PathConflict(s) => UsermuxError::PathConflict(s.clone()),
        UsermuxError::AccountInUse(s) => UsermuxError::AccountInUse(s.clone()),
        UsermuxError::BackendUnavailable(s) => UsermuxError::BackendUnavailable(s.clone()),
        UsermuxError::CommandFailed {
            program,
            code,
            stderr,
        } => UsermuxError::CommandFailed {
            program: program.clone(),
            code: *code,
            stderr: stderr.clone(),
        },
        other => UsermuxError::Other(anyhow::anyhow!("{}", other)),
    }
}

impl MockBackend {
    /// Creates a new mock backend with empty storage.
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            homes: Arc::new(RwLock::new(HashSet::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            probe_error: None,
            lookup_error: None,
            enumerate_error: None,
            create_error: None,
            delete_error: None,
            set_credential_error: None,
            lock_credential_error: None,
            ensure_home_error: None,
            remove_home_error: None,
        }
    }

    /// Handle on the account map. Clone before boxing the backend to keep
    /// inspecting state from tests.
    pub fn state_handle(&self) -> MockState {
        Arc::clone(&self.accounts)
    }

    /// Handle on the pseudo-filesystem of home directories.
    pub fn homes_handle(&self) -> Arc<RwLock<HashSet<PathBuf>>> {
        Arc::clone(&self.homes)
    }

    /// Handle on the ordered call log. Every trait method records
    /// `"<method> <username>"` before doing anything else.
    pub fn calls_handle(&self) -> Arc<RwLock<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    /// Pre-populates the backend with an account record.
    ///
    /// Useful for setting up test fixtures without running a transaction.
    pub async fn set_account(&self, identity: AccountIdentity) {
        let mut accounts = self.accounts.write().await;
        accounts.insert(
            identity.username.clone(),
            MockAccount {
                identity,
                credential: None,
                locked: false,
            },
        );
    }

    /// Pre-populates the pseudo-filesystem with an existing directory.
    pub async fn set_home(&self, path: impl Into<PathBuf>) {
        let mut homes = self.homes.write().await;
        homes.insert(path.into());
    }

    async fn record(&self, method: &str, subject: &str) {
        let mut calls = self.calls.write().await;
        calls.push(format!("{} {}", method, subject));
    }

    fn next_uid(accounts: &HashMap<String, MockAccount>, class: AccountClass) -> u32 {
        // Normal ids grow upward from the floor, system ids sit below it,
        // mirroring how the real allocators partition the id space.
        let range = match class {
            AccountClass::Normal => 1000..u32::MAX,
            AccountClass::System => 100..1000,
        };
        accounts
            .values()
            .map(|a| a.identity.uid)
            .filter(|uid| range.contains(uid))
            .max()
            .map_or(range.start, |max| max + 1)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self) -> Result<()> {
        self.record("probe", "-").await;
        if let Some(err) = &self.probe_error {
            return Err(clone_injected(err));
        }
        Ok(())
    }

    async fn lookup(&self, username: &str) -> Result<Option<AccountIdentity>> {
        self.record("lookup", username).await;
        if let Some(err) = &self.lookup_error {
            return Err(clone_injected(err));
        }

        let accounts = self.accounts.read().await;
        Ok(accounts.get(username).map(|a| a.identity.clone()))
    }

    async fn enumerate(&self, pattern: Option<&str>) -> Result<Vec<AccountIdentity>> {
        self.record("enumerate", pattern.unwrap_or("-")).await;
        if let Some(err) = &self.enumerate_error {
            return Err(clone_injected(err));
        }

        let needle = pattern.map(str::to_lowercase);
        let accounts = self.accounts.read().await;
        let mut listing: Vec<AccountIdentity> = accounts
            .values()
            .filter(|a| match &needle {
                Some(p) => a.identity.username.to_lowercase().contains(p),
                None => true,
            })
            .map(|a| a.identity.clone())
            .collect();
        listing.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(listing)
    }

    async fn create_account(&mut self, spec: &AccountSpec) -> Result<()> {
        self.record("create_account", &spec.username).await;
        if let Some(err) = &self.create_error {
            return Err(clone_injected(err));
        }

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&spec.username) {
            return Err(UsermuxError::AlreadyExists(spec.username.clone()));
        }

        let uid = Self::next_uid(&accounts, spec.class);
        accounts.insert(
            spec.username.clone(),
            MockAccount {
                identity: AccountIdentity {
                    username: spec.username.clone(),
                    uid,
                    description: spec.comment.clone(),
                    home_dir: spec.home_dir.clone(),
                },
                credential: None,
                locked: false,
            },
        );
        Ok(())
    }

    async fn delete_account(&mut self, username: &str) -> Result<()> {
        self.record("delete_account", username).await;
        if let Some(err) = &self.delete_error {
            return Err(clone_injected(err));
        }

        let mut accounts = self.accounts.write().await;
        accounts
            .remove(username)
            .ok_or_else(|| UsermuxError::NotFound(username.to_string()))?;
        Ok(())
    }

    async fn set_credential(&mut self, username: &str, credential: &Credential) -> Result<()> {
        self.record("set_credential", username).await;
        if let Some(err) = &self.set_credential_error {
            return Err(clone_injected(err));
        }

        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(username)
            .ok_or_else(|| UsermuxError::NotFound(username.to_string()))?;
        account.credential = Some(credential.clone());
        account.locked = false;
        Ok(())
    }

    async fn lock_credential(&mut self, username: &str) -> Result<()> {
        self.record("lock_credential", username).await;
        if let Some(err) = &self.lock_credential_error {
            return Err(clone_injected(err));
        }

        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(username)
            .ok_or_else(|| UsermuxError::NotFound(username.to_string()))?;
        account.locked = true;
        Ok(())
    }

    async fn ensure_home(
        &mut self,
        username: &str,
        path: &Path,
        policy: HomePolicy,
    ) -> Result<()> {
        self.record("ensure_home", username).await;
        if let Some(err) = &self.ensure_home_error {
            return Err(clone_injected(err));
        }

        let mut homes = self.homes.write().await;
        match policy {
            HomePolicy::Create => {
                if !homes.insert(path.to_path_buf()) {
                    return Err(UsermuxError::PathConflict(format!(
                        "{} already exists",
                        path.display()
                    )));
                }
            }
            HomePolicy::UseExisting => {
                if !homes.contains(path) {
                    return Err(UsermuxError::PathConflict(format!(
                        "{} does not exist",
                        path.display()
                    )));
                }
            }
            HomePolicy::Skip => {}
        }
        Ok(())
    }

    async fn remove_home(&mut self, username: &str, path: &Path) -> Result<()> {
        self.record("remove_home", username).await;
        if let Some(err) = &self.remove_home_error {
            return Err(clone_injected(err));
        }

        let mut homes = self.homes.write().await;
        if !homes.remove(path) {
            return Err(UsermuxError::PathConflict(format!(
                "{} does not exist",
                path.display()
            )));
        }
        Ok(())
    }
}

/// Registers the mock backend with the factory.
pub fn register() {
    crate::factory::register_backend("mock", |_cfg| Ok(Box::new(MockBackend::new())));
}
