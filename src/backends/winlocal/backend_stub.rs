//! Stub implementation for non-Windows platforms.

use crate::{
    AccountBackend, AccountIdentity, AccountSpec, Config, Credential, HomePolicy, Result,
    UsermuxError,
};
use async_trait::async_trait;
use std::path::Path;

/// Stub Windows local accounts backend for non-Windows platforms.
///
/// Every call reports `BackendUnavailable`, so a misconfigured host fails
/// loudly at `probe` time instead of at build time.
pub struct WinLocalBackend;

fn unavailable() -> UsermuxError {
    UsermuxError::BackendUnavailable(
        "the winlocal backend is only available on Windows".to_string(),
    )
}

impl WinLocalBackend {
    /// Creates a new stub backend.
    pub fn new(_config: Config) -> Self {
        Self
    }
}

#[async_trait]
impl AccountBackend for WinLocalBackend {
    fn name(&self) -> &str {
        "winlocal"
    }

    fn normalize_username(&self, raw: &str) -> String {
        raw.to_lowercase()
    }

    async fn probe(&self) -> Result<()> {
        Err(unavailable())
    }

    async fn lookup(&self, _username: &str) -> Result<Option<AccountIdentity>> {
        Err(unavailable())
    }

    async fn enumerate(&self, _pattern: Option<&str>) -> Result<Vec<AccountIdentity>> {
        Err(unavailable())
    }

    async fn create_account(&mut self, _spec: &AccountSpec) -> Result<()> {
        Err(unavailable())
    }

    async fn delete_account(&mut self, _username: &str) -> Result<()> {
        Err(unavailable())
    }

    async fn set_credential(&mut self, _username: &str, _credential: &Credential) -> Result<()> {
        Err(unavailable())
    }

    async fn lock_credential(&mut self, _username: &str) -> Result<()> {
        Err(unavailable())
    }

    async fn ensure_home(
        &mut self,
        _username: &str,
        _path: &Path,
        _policy: HomePolicy,
    ) -> Result<()> {
        Err(unavailable())
    }

    async fn remove_home(&mut self, _username: &str, _path: &Path) -> Result<()> {
        Err(unavailable())
    }
}
