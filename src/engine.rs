//! The account engine: observe, plan, execute, report.
//!
//! [`AccountEngine`] is the façade callers use. Each operation runs as one
//! transaction: normalize and validate input, observe live state through
//! the backend, build a plan, execute it with rollback, and fold the
//! result into an [`Outcome`]. The engine itself never panics and never
//! exits the process; every failure mode is a value in the outcome.

use crate::executor::{self, ExecutionReport};
use crate::planner::{self, Intent, Observation, OperationKind, StepKind};
use crate::validation::validate_username;
use crate::{
    AccountBackend, AccountIdentity, AccountSpec, Config, Credential, HomePolicy, Result,
    UsermuxError,
};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// The result of one engine operation, success or failure.
///
/// Outcomes are values, not errors: a failed transaction still returns an
/// outcome describing the failing step, the primary error, and any
/// rollback residue. Errors serialize as their display strings.
#[derive(Debug, Serialize)]
pub struct Outcome {
    /// Transaction id, unique per operation. Appears in every log record
    /// the transaction emitted, for correlation.
    pub txn: Uuid,
    /// Which operation ran.
    pub operation: OperationKind,
    /// The account targeted, in the backend's canonical form.
    pub username: String,
    /// When the transaction finished.
    pub completed_at: DateTime<Utc>,
    /// True when every planned step applied.
    pub success: bool,
    /// Steps that applied, in execution order.
    pub applied: Vec<StepKind>,
    /// The step that failed, when failure happened during execution.
    /// `None` for failures rejected at planning time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<StepKind>,
    /// The primary error.
    #[serde(
        serialize_with = "serialize_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<UsermuxError>,
    /// Compensations that failed during rollback, leaving residue behind.
    #[serde(
        serialize_with = "serialize_errors",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub compensation_failures: Vec<UsermuxError>,
}

fn serialize_error<S>(
    err: &Option<UsermuxError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match err {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

fn serialize_errors<S>(
    errs: &[UsermuxError],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(errs.iter().map(ToString::to_string))
}

/// Policy-driven, transactional façade over an [`AccountBackend`].
///
/// The engine owns its backend and a [`Config`] supplying defaults (login
/// shell, home base directory). Operations are sequential: one transaction
/// at a time, each observing state fresh.
///
/// # Example
///
/// ```no_run
/// use usermux::{AccountEngine, AccountSpec, BackendKind, Config};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> usermux::Result<()> {
///     usermux::init();
///     let mut engine = AccountEngine::from_config(Config::new(BackendKind::Posix))?;
///
///     let spec = AccountSpec::new("deploy").with_credential("s3cr3t");
///     let outcome = engine.create(spec).await;
///     if !outcome.success {
///         eprintln!("create failed: {:?}", outcome.error);
///     }
///     Ok(())
/// }
/// ```
pub struct AccountEngine {
    backend: Box<dyn AccountBackend>,
    config: Config,
}

impl AccountEngine {
    /// Wraps an existing backend.
    pub fn new(backend: Box<dyn AccountBackend>, config: Config) -> Self {
        Self { backend, config }
    }

    /// Builds the backend named by the configuration and wraps it.
    ///
    /// # Errors
    ///
    /// Returns an error when the configured backend is not registered
    /// (missing feature flag) or its factory fails.
    pub fn from_config(config: Config) -> Result<Self> {
        let backend = crate::factory::new_backend(config.clone())?;
        Ok(Self::new(backend, config))
    }

    /// The name of the underlying backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Verifies the backend can reach its account store.
    pub async fn probe(&self) -> Result<()> {
        self.backend.probe().await
    }

    /// Creates an account transactionally.
    ///
    /// Input problems (bad name, empty credential) are rejected before the
    /// backend is consulted at all. A duplicate account is rejected after
    /// one lookup, with no mutations.
    pub async fn create(&mut self, spec: AccountSpec) -> Outcome {
        let txn = Uuid::new_v4();
        let username = self.backend.normalize_username(&spec.username);

        if let Err(err) = validate_username(&username) {
            return self.rejected(txn, OperationKind::Create, username, err);
        }
        if let Some(credential) = &spec.credential {
            if credential.is_empty() {
                let err = UsermuxError::InvalidCredential(
                    "credential must not be empty".to_string(),
                );
                return self.rejected(txn, OperationKind::Create, username, err);
            }
        }

        let spec = self.resolve(spec, &username);
        let observed = match self.observe(&username).await {
            Ok(observed) => observed,
            Err(err) => return self.rejected(txn, OperationKind::Create, username, err),
        };

        self.transact(txn, Intent::Create(spec), observed).await
    }

    /// Deletes an account transactionally, optionally removing its home
    /// directory first.
    pub async fn delete(&mut self, username: &str, remove_home: bool) -> Outcome {
        let txn = Uuid::new_v4();
        let username = self.backend.normalize_username(username);

        let observed = match self.observe(&username).await {
            Ok(observed) => observed,
            Err(err) => return self.rejected(txn, OperationKind::Delete, username, err),
        };

        self.transact(
            txn,
            Intent::Delete {
                username,
                remove_home,
            },
            observed,
        )
        .await
    }

    /// Replaces an account's credential transactionally.
    ///
    /// An empty credential is rejected before any backend call, including
    /// the existence lookup.
    pub async fn set_password(&mut self, username: &str, credential: Credential) -> Outcome {
        let txn = Uuid::new_v4();
        let username = self.backend.normalize_username(username);

        if credential.is_empty() {
            let err =
                UsermuxError::InvalidCredential("credential must not be empty".to_string());
            return self.rejected(txn, OperationKind::SetPassword, username, err);
        }

        let observed = match self.observe(&username).await {
            Ok(observed) => observed,
            Err(err) => return self.rejected(txn, OperationKind::SetPassword, username, err),
        };

        self.transact(
            txn,
            Intent::SetPassword {
                username,
                credential,
            },
            observed,
        )
        .await
    }

    /// Lists accounts the way an operator expects to see them: root plus
    /// everything at or above the backend's system id floor, sorted by name.
    ///
    /// `pattern` filters by case-insensitive substring match on the name.
    pub async fn list(&self, pattern: Option<&str>) -> Result<Vec<AccountIdentity>> {
        let floor = self.backend.system_id_floor();
        let listing = self.backend.enumerate(pattern).await?;
        Ok(listing
            .into_iter()
            .filter(|identity| identity.uid == 0 || identity.uid >= floor)
            .collect())
    }

    /// Fills config defaults into a spec: the login shell, and a home path
    /// of `<home_base>/<username>` when a home is wanted but none given.
    fn resolve(&self, mut spec: AccountSpec, username: &str) -> AccountSpec {
        spec.username = username.to_string();
        if spec.shell.is_none() {
            spec.shell = Some(self.config.default_shell.clone());
        }
        if spec.home_policy != HomePolicy::Skip && spec.home_dir.is_none() {
            spec.home_dir = Some(self.config.home_base.join(username));
        }
        spec
    }

    /// One fresh observation of the target account.
    async fn observe(&self, username: &str) -> Result<Observation> {
        let identity = self.backend.lookup(username).await?;
        Ok(Observation { identity })
    }

    async fn transact(&mut self, txn: Uuid, intent: Intent, observed: Observation) -> Outcome {
        let operation = intent.operation();
        let username = intent.username().to_string();

        let plan = match planner::plan(&intent, &observed) {
            Ok(plan) => plan,
            Err(err) => return self.rejected(txn, operation, username, err),
        };

        tracing::debug!(
            txn = %txn,
            backend = self.backend.name(),
            operation = %operation,
            username = %username,
            steps = ?plan.step_kinds(),
            "executing plan"
        );

        let report = executor::run(self.backend.as_mut(), &plan).await;
        self.conclude(txn, operation, username, report)
    }

    /// Outcome for a transaction rejected before any step ran.
    fn rejected(
        &self,
        txn: Uuid,
        operation: OperationKind,
        username: String,
        err: UsermuxError,
    ) -> Outcome {
        tracing::warn!(
            txn = %txn,
            backend = self.backend.name(),
            operation = %operation,
            username = %username,
            error = %err,
            "transaction rejected"
        );
        Outcome {
            txn,
            operation,
            username,
            completed_at: Utc::now(),
            success: false,
            applied: Vec::new(),
            failed_step: None,
            error: Some(err),
            compensation_failures: Vec::new(),
        }
    }

    fn conclude(
        &self,
        txn: Uuid,
        operation: OperationKind,
        username: String,
        report: ExecutionReport,
    ) -> Outcome {
        let outcome = Outcome {
            txn,
            operation,
            username,
            completed_at: Utc::now(),
            success: report.success(),
            applied: report.applied,
            failed_step: report.failed_step,
            error: report.error,
            compensation_failures: report.compensation_failures,
        };

        if outcome.success {
            tracing::info!(
                txn = %txn,
                backend = self.backend.name(),
                operation = %outcome.operation,
                username = %outcome.username,
                "transaction committed"
            );
        } else {
            let reason = outcome
                .error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            tracing::warn!(
                txn = %txn,
                backend = self.backend.name(),
                operation = %outcome.operation,
                username = %outcome.username,
                error = %reason,
                compensation_failures = outcome.compensation_failures.len(),
                "transaction failed"
            );
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::{MockBackend, MockState};
    use crate::BackendKind;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    type CallLog = Arc<RwLock<Vec<String>>>;

    fn mock_engine() -> (AccountEngine, MockState, CallLog) {
        let backend = MockBackend::new();
        let state = backend.state_handle();
        let calls = backend.calls_handle();
        let engine = AccountEngine::new(Box::new(backend), Config::new(BackendKind::Mock));
        (engine, state, calls)
    }

    fn identity(username: &str, uid: u32, home: Option<&str>) -> AccountIdentity {
        AccountIdentity {
            username: username.to_string(),
            uid,
            description: None,
            home_dir: home.map(PathBuf::from),
        }
    }

    #[tokio::test]
    async fn test_create_resolves_config_defaults() {
        let (mut engine, state, _) = mock_engine();

        let outcome = engine
            .create(AccountSpec::new("alice").with_credential("pw"))
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.operation, OperationKind::Create);
        assert_eq!(
            outcome.applied,
            vec![
                StepKind::EnsurePresent,
                StepKind::CreateHome,
                StepKind::SetCredential
            ]
        );

        let accounts = state.read().await;
        assert_eq!(
            accounts["alice"].identity.home_dir.as_deref(),
            Some(Path::new("/home/alice"))
        );
    }

    #[tokio::test]
    async fn test_create_duplicate_mutates_nothing() {
        let (mut engine, _, calls) = mock_engine();
        let first = engine
            .create(AccountSpec::new("alice").with_credential("pw"))
            .await;
        assert!(first.success);
        calls.write().await.clear();

        let second = engine
            .create(AccountSpec::new("alice").with_credential("pw"))
            .await;

        assert!(!second.success);
        assert!(matches!(second.error, Some(UsermuxError::AlreadyExists(_))));
        assert!(second.applied.is_empty());
        // The duplicate attempt observed state once and touched nothing.
        assert_eq!(*calls.read().await, vec!["lookup alice"]);
    }

    #[tokio::test]
    async fn test_invalid_name_never_reaches_backend() {
        let (mut engine, _, calls) = mock_engine();

        let outcome = engine.create(AccountSpec::new("bad name")).await;

        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(UsermuxError::InvalidName(_))));
        assert!(calls.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_credential_on_create_never_reaches_backend() {
        let (mut engine, _, calls) = mock_engine();

        let outcome = engine
            .create(AccountSpec::new("alice").with_credential(""))
            .await;

        assert!(!outcome.success);
        assert!(matches!(
            outcome.error,
            Some(UsermuxError::InvalidCredential(_))
        ));
        assert!(calls.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_credential_on_set_password_never_reaches_backend() {
        let (mut engine, _, calls) = mock_engine();

        let outcome = engine.set_password("alice", Credential::new("")).await;

        assert!(!outcome.success);
        assert!(matches!(
            outcome.error,
            Some(UsermuxError::InvalidCredential(_))
        ));
        assert!(calls.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_set_password_for_missing_account() {
        let (mut engine, _, calls) = mock_engine();

        let outcome = engine.set_password("ghost", Credential::new("pw")).await;

        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(UsermuxError::NotFound(_))));
        assert_eq!(*calls.read().await, vec!["lookup ghost"]);
    }

    #[tokio::test]
    async fn test_set_password_updates_credential() {
        let (mut engine, state, _) = mock_engine();
        engine
            .create(AccountSpec::new("alice").with_credential("old"))
            .await;

        let outcome = engine
            .set_password("alice", Credential::new("brand-new"))
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.applied, vec![StepKind::SetCredential]);
        let accounts = state.read().await;
        assert_eq!(
            accounts["alice"].credential.as_ref().unwrap().expose(),
            "brand-new"
        );
    }

    #[tokio::test]
    async fn test_delete_missing_account() {
        let (mut engine, _, calls) = mock_engine();

        let outcome = engine.delete("ghost", false).await;

        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(UsermuxError::NotFound(_))));
        assert_eq!(*calls.read().await, vec!["lookup ghost"]);
    }

    #[tokio::test]
    async fn test_delete_with_home_removal() {
        let backend = MockBackend::new();
        let state = backend.state_handle();
        let homes = backend.homes_handle();
        backend
            .set_account(identity("alice", 1000, Some("/home/alice")))
            .await;
        backend.set_home("/home/alice").await;
        let mut engine =
            AccountEngine::new(Box::new(backend), Config::new(BackendKind::Mock));

        let outcome = engine.delete("alice", true).await;

        assert!(outcome.success);
        assert_eq!(
            outcome.applied,
            vec![StepKind::RemoveHome, StepKind::EnsureAbsent]
        );
        assert!(state.read().await.is_empty());
        assert!(homes.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_create_rolls_back_and_reports() {
        let mut backend = MockBackend::new();
        backend.set_credential_error =
            Some(UsermuxError::PolicyRejected("too weak".to_string()));
        let state = backend.state_handle();
        let mut engine =
            AccountEngine::new(Box::new(backend), Config::new(BackendKind::Mock));

        let outcome = engine
            .create(AccountSpec::new("alice").with_credential("pw"))
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.failed_step, Some(StepKind::SetCredential));
        assert!(matches!(
            outcome.error,
            Some(UsermuxError::PolicyRejected(_))
        ));
        assert!(outcome.compensation_failures.is_empty());
        // Rollback left nothing behind.
        assert!(state.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_surfaces_as_rejection() {
        let mut backend = MockBackend::new();
        backend.lookup_error =
            Some(UsermuxError::BackendUnavailable("store offline".to_string()));
        let mut engine =
            AccountEngine::new(Box::new(backend), Config::new(BackendKind::Mock));

        let outcome = engine.delete("alice", false).await;

        assert!(!outcome.success);
        assert!(matches!(
            outcome.error,
            Some(UsermuxError::BackendUnavailable(_))
        ));
        assert!(outcome.applied.is_empty());
    }

    #[tokio::test]
    async fn test_list_hides_system_accounts_but_keeps_root() {
        let backend = MockBackend::new();
        backend.set_account(identity("root", 0, Some("/root"))).await;
        backend.set_account(identity("daemon", 2, None)).await;
        backend.set_account(identity("sshd", 999, None)).await;
        backend
            .set_account(identity("alice", 1000, Some("/home/alice")))
            .await;
        backend
            .set_account(identity("bob", 5000, Some("/home/bob")))
            .await;
        let engine = AccountEngine::new(Box::new(backend), Config::new(BackendKind::Mock));

        let listing = engine.list(None).await.unwrap();
        let names: Vec<&str> = listing.iter().map(|i| i.username.as_str()).collect();

        assert_eq!(names, vec!["alice", "bob", "root"]);
    }

    #[tokio::test]
    async fn test_list_with_pattern() {
        let backend = MockBackend::new();
        backend.set_account(identity("alice", 1000, None)).await;
        backend.set_account(identity("malice", 1001, None)).await;
        backend.set_account(identity("bob", 1002, None)).await;
        let engine = AccountEngine::new(Box::new(backend), Config::new(BackendKind::Mock));

        let listing = engine.list(Some("ALI")).await.unwrap();
        let names: Vec<&str> = listing.iter().map(|i| i.username.as_str()).collect();

        assert_eq!(names, vec!["alice", "malice"]);
    }

    #[tokio::test]
    async fn test_outcome_serializes_errors_as_strings() {
        let (mut engine, _, _) = mock_engine();
        let outcome = engine.delete("ghost", false).await;

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], serde_json::Value::Bool(false));
        assert!(json["error"]
            .as_str()
            .unwrap()
            .contains("account not found"));
        assert!(json.get("failed_step").is_none());
    }
}
