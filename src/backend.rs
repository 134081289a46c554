//! Backend trait definition for account providers.
//!
//! This module defines the core [`AccountBackend`] trait that all account
//! providers must satisfy. The trait provides a unified interface over the
//! OS-specific primitives for creating, deleting, and credentialing local
//! accounts, plus the queries the planner needs to observe live state.

use crate::{AccountIdentity, AccountSpec, Credential, HomePolicy, Result};
use async_trait::async_trait;
use std::path::Path;

/// AccountBackend represents a provider of local OS accounts.
///
/// All implementations must be `Send + Sync` to support concurrent access
/// across async tasks.
///
/// Each method is a single narrow primitive. Backends never sequence
/// primitives themselves; ordering and rollback belong to the planner and
/// executor, so a backend stays honest about exactly one side effect per
/// call.
///
/// # Implementations
///
/// - **Tool-based**: POSIX shadow-utils (`useradd`, `userdel`, `chpasswd`)
/// - **OS-native**: Windows local accounts (PowerShell `LocalAccounts` module)
/// - **Testing**: Mock backend with error injection
///
/// # Example
///
/// ```no_run
/// use usermux::{AccountSpec, BackendKind, Config};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> usermux::Result<()> {
///     let config = Config::new(BackendKind::Posix);
///     let mut backend = usermux::factory::new_backend(config)?;
///
///     backend.probe().await?;
///     let spec = AccountSpec::new("deploy").with_credential("hunter2");
///     backend.create_account(&spec).await?;
///
///     let found = backend.lookup("deploy").await?;
///     println!("created: {:?}", found);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait AccountBackend: Send + Sync {
    // ========================================================================
    // Metadata and policy
    // ========================================================================

    /// Returns the backend name (e.g., "posix", "winlocal", "mock").
    fn name(&self) -> &str;

    /// Canonicalizes a raw username into the backend's native form.
    ///
    /// POSIX treats names case-sensitively, so the default is the identity
    /// transform. Windows account names are case-insensitive and are
    /// normalized to lowercase there. All trait methods expect names that
    /// have already been normalized.
    fn normalize_username(&self, raw: &str) -> String {
        raw.to_string()
    }

    /// The numeric id at which regular (non-system) accounts start.
    ///
    /// Listings keep root (`uid == 0`) and everything at or above this
    /// floor, and hide the service accounts in between.
    fn system_id_floor(&self) -> u32 {
        1000
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Verifies the backend can reach its underlying account store.
    ///
    /// For tool-based backends, this checks the required system tools are
    /// installed. For PowerShell, this checks the `LocalAccounts` module
    /// responds.
    ///
    /// # Errors
    ///
    /// Returns [`UsermuxError::BackendUnavailable`](crate::UsermuxError::BackendUnavailable)
    /// if the tools or modules this backend drives are missing.
    async fn probe(&self) -> Result<()>;

    // ========================================================================
    // Queries
    // ========================================================================

    /// Looks up an account by name, returning `None` when it is absent.
    ///
    /// This is the only observation the planner trusts; results are never
    /// cached, so every transaction sees live state.
    ///
    /// # Errors
    ///
    /// Returns an error only when the state of the account could not be
    /// determined at all (backend unreachable, query tool failed). Absence
    /// is `Ok(None)`, not an error.
    async fn lookup(&self, username: &str) -> Result<Option<AccountIdentity>>;

    /// Checks if an account exists.
    async fn exists(&self, username: &str) -> Result<bool> {
        Ok(self.lookup(username).await?.is_some())
    }

    /// Lists accounts, optionally filtered by a case-insensitive substring
    /// match on the username.
    ///
    /// Results are sorted by username ascending for deterministic output.
    /// No system-account filtering happens here; callers apply
    /// [`system_id_floor`](Self::system_id_floor) if they want the
    /// user-facing view.
    async fn enumerate(&self, pattern: Option<&str>) -> Result<Vec<AccountIdentity>>;

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Creates the account record itself, without a home directory and
    /// without a usable credential.
    ///
    /// Home directories and credentials are separate primitives so each can
    /// be rolled back independently.
    ///
    /// # Errors
    ///
    /// - [`UsermuxError::AlreadyExists`](crate::UsermuxError::AlreadyExists):
    ///   An account with this name already exists
    /// - [`UsermuxError::InvalidName`](crate::UsermuxError::InvalidName):
    ///   The OS rejected the username
    /// - [`UsermuxError::PermissionDenied`](crate::UsermuxError::PermissionDenied):
    ///   Caller lacks the privilege to create accounts
    /// - [`UsermuxError::PolicyRejected`](crate::UsermuxError::PolicyRejected):
    ///   The spec asks for something this backend cannot express
    async fn create_account(&mut self, spec: &AccountSpec) -> Result<()>;

    /// Deletes the account record. Does not touch the home directory.
    ///
    /// # Errors
    ///
    /// - [`UsermuxError::NotFound`](crate::UsermuxError::NotFound):
    ///   Account does not exist
    /// - [`UsermuxError::AccountInUse`](crate::UsermuxError::AccountInUse):
    ///   Account has running processes and cannot be removed
    /// - [`UsermuxError::PermissionDenied`](crate::UsermuxError::PermissionDenied):
    ///   Caller lacks the privilege to delete accounts
    async fn delete_account(&mut self, username: &str) -> Result<()>;

    /// Sets the account's credential.
    ///
    /// Implementations must keep the secret out of argument lists and
    /// process listings; tool-based backends feed it over stdin.
    ///
    /// # Errors
    ///
    /// - [`UsermuxError::NotFound`](crate::UsermuxError::NotFound):
    ///   Account does not exist
    /// - [`UsermuxError::PolicyRejected`](crate::UsermuxError::PolicyRejected):
    ///   The OS password policy refused the credential
    async fn set_credential(&mut self, username: &str, credential: &Credential) -> Result<()>;

    /// Locks the account's credential so nobody can authenticate with it.
    ///
    /// Used when an account is created without a credential: the account
    /// exists but starts unusable instead of passwordless.
    ///
    /// # Errors
    ///
    /// - [`UsermuxError::NotFound`](crate::UsermuxError::NotFound):
    ///   Account does not exist
    async fn lock_credential(&mut self, username: &str) -> Result<()>;

    /// Materializes the account's home directory at `path` per `policy`.
    ///
    /// With [`HomePolicy::Create`] the directory must not already exist.
    /// With [`HomePolicy::UseExisting`] the directory must already exist and
    /// is adopted without modification. [`HomePolicy::Skip`] never reaches
    /// the backend.
    ///
    /// # Errors
    ///
    /// - [`UsermuxError::PathConflict`](crate::UsermuxError::PathConflict):
    ///   `Create` found the path occupied, or `UseExisting` found nothing
    /// - [`UsermuxError::PolicyRejected`](crate::UsermuxError::PolicyRejected):
    ///   This backend does not manage home directories
    async fn ensure_home(&mut self, username: &str, path: &Path, policy: HomePolicy)
        -> Result<()>;

    /// Removes the account's home directory at `path`.
    ///
    /// # Errors
    ///
    /// - [`UsermuxError::PathConflict`](crate::UsermuxError::PathConflict):
    ///   The path is missing or is not owned by the account
    /// - [`UsermuxError::PolicyRejected`](crate::UsermuxError::PolicyRejected):
    ///   This backend does not manage home directories
    async fn remove_home(&mut self, username: &str, path: &Path) -> Result<()>;
}
