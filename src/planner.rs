//! Pure transaction planning.
//!
//! [`plan`] turns an intent plus one observation of live state into an
//! ordered list of reversible steps. It performs no I/O itself: every
//! existence fact comes in through [`Observation`], captured immediately
//! before planning, and every side effect goes out as an [`Action`] for
//! the executor to apply. Conflicts with observed state (duplicate
//! creates, deletes of missing accounts) are rejected here, before any
//! backend mutation.

use crate::{AccountIdentity, AccountSpec, Credential, HomePolicy, Result, UsermuxError};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// The operation a plan realizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Create,
    Delete,
    SetPassword,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Delete => write!(f, "delete"),
            Self::SetPassword => write!(f, "set-password"),
        }
    }
}

/// Discriminant for a planned step, used in reports and error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    EnsurePresent,
    EnsureAbsent,
    SetCredential,
    LockCredential,
    CreateHome,
    RemoveHome,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnsurePresent => write!(f, "ensure-present"),
            Self::EnsureAbsent => write!(f, "ensure-absent"),
            Self::SetCredential => write!(f, "set-credential"),
            Self::LockCredential => write!(f, "lock-credential"),
            Self::CreateHome => write!(f, "create-home"),
            Self::RemoveHome => write!(f, "remove-home"),
        }
    }
}

/// A single backend effect, carrying everything needed to apply it.
///
/// Actions are plain data. The executor is the only component that turns
/// one into a backend call, which keeps forward application and rollback
/// on the same code path.
#[derive(Debug, Clone)]
pub enum Action {
    /// Create the account record described by `spec`.
    EnsurePresent { spec: AccountSpec },
    /// Delete the account record.
    EnsureAbsent { username: String },
    /// Set the account's credential.
    SetCredential {
        username: String,
        credential: Credential,
    },
    /// Lock the account's credential so it starts unusable.
    LockCredential { username: String },
    /// Materialize the home directory at `path` per `policy`.
    CreateHome {
        username: String,
        path: PathBuf,
        policy: HomePolicy,
    },
    /// Remove the home directory at `path`.
    RemoveHome { username: String, path: PathBuf },
}

impl Action {
    /// The step discriminant this action applies.
    pub fn kind(&self) -> StepKind {
        match self {
            Self::EnsurePresent { .. } => StepKind::EnsurePresent,
            Self::EnsureAbsent { .. } => StepKind::EnsureAbsent,
            Self::SetCredential { .. } => StepKind::SetCredential,
            Self::LockCredential { .. } => StepKind::LockCredential,
            Self::CreateHome { .. } => StepKind::CreateHome,
            Self::RemoveHome { .. } => StepKind::RemoveHome,
        }
    }
}

/// One planned step: a forward action and its compensation, if reversal
/// is possible.
///
/// Compensations only restore what the forward action itself changed.
/// A step that adopts pre-existing state (a home directory created by
/// someone else) or destroys unrecoverable state (an old credential)
/// carries no compensation.
#[derive(Debug, Clone)]
pub struct Step {
    pub forward: Action,
    pub compensate: Option<Action>,
}

impl Step {
    fn new(forward: Action, compensate: Option<Action>) -> Self {
        Self {
            forward,
            compensate,
        }
    }

    /// The step discriminant of the forward action.
    pub fn kind(&self) -> StepKind {
        self.forward.kind()
    }
}

/// An ordered, immutable list of steps realizing one operation.
#[derive(Debug, Clone)]
pub struct TransactionPlan {
    pub operation: OperationKind,
    pub username: String,
    pub steps: Vec<Step>,
}

impl TransactionPlan {
    /// Step discriminants in execution order.
    pub fn step_kinds(&self) -> Vec<StepKind> {
        self.steps.iter().map(Step::kind).collect()
    }
}

/// What the caller wants done.
///
/// The engine normalizes the username and resolves configuration defaults
/// (shell, home path) before constructing an intent, so planning never has
/// to guess at paths.
#[derive(Debug, Clone)]
pub enum Intent {
    Create(AccountSpec),
    Delete { username: String, remove_home: bool },
    SetPassword {
        username: String,
        credential: Credential,
    },
}

impl Intent {
    /// The account the intent targets.
    pub fn username(&self) -> &str {
        match self {
            Self::Create(spec) => &spec.username,
            Self::Delete { username, .. } => username,
            Self::SetPassword { username, .. } => username,
        }
    }

    /// The operation kind the intent plans to.
    pub fn operation(&self) -> OperationKind {
        match self {
            Self::Create(_) => OperationKind::Create,
            Self::Delete { .. } => OperationKind::Delete,
            Self::SetPassword { .. } => OperationKind::SetPassword,
        }
    }
}

/// Live state observed immediately before planning.
///
/// Observations are captured fresh for every transaction and never cached
/// across them, so each plan answers to the state that actually existed
/// when it was built.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    /// The account as it currently exists, or `None` when absent.
    pub identity: Option<AccountIdentity>,
}

impl Observation {
    pub fn present(identity: AccountIdentity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub fn absent() -> Self {
        Self { identity: None }
    }
}

/// Builds the ordered step list for an intent against observed state.
///
/// # Errors
///
/// - [`UsermuxError::AlreadyExists`]: create targets an existing account
/// - [`UsermuxError::NotFound`]: delete or set-password targets a missing
///   account
/// - [`UsermuxError::InvalidCredential`]: a supplied credential is empty
/// - [`UsermuxError::PathConflict`]: delete asked to remove a home the
///   account does not record
pub fn plan(intent: &Intent, observed: &Observation) -> Result<TransactionPlan> {
    match intent {
        Intent::Create(spec) => plan_create(spec, observed),
        Intent::Delete {
            username,
            remove_home,
        } => plan_delete(username, *remove_home, observed),
        Intent::SetPassword {
            username,
            credential,
        } => plan_set_password(username, credential, observed),
    }
}

fn plan_create(spec: &AccountSpec, observed: &Observation) -> Result<TransactionPlan> {
    if let Some(credential) = &spec.credential {
        if credential.is_empty() {
            return Err(UsermuxError::InvalidCredential(
                "credential must not be empty".to_string(),
            ));
        }
    }
    if observed.identity.is_some() {
        return Err(UsermuxError::AlreadyExists(spec.username.clone()));
    }

    let username = spec.username.clone();
    let mut steps = Vec::with_capacity(3);

    steps.push(Step::new(
        Action::EnsurePresent { spec: spec.clone() },
        Some(Action::EnsureAbsent {
            username: username.clone(),
        }),
    ));

    if spec.home_policy != HomePolicy::Skip {
        let path = spec.home_dir.clone().ok_or_else(|| {
            UsermuxError::PolicyRejected(format!(
                "home policy {} requires a resolved home path",
                spec.home_policy
            ))
        })?;
        // Only a directory this transaction created gets torn back down;
        // an adopted one is not ours to destroy.
        let compensate = match spec.home_policy {
            HomePolicy::Create => Some(Action::RemoveHome {
                username: username.clone(),
                path: path.clone(),
            }),
            HomePolicy::UseExisting => None,
            HomePolicy::Skip => unreachable!(),
        };
        steps.push(Step::new(
            Action::CreateHome {
                username: username.clone(),
                path,
                policy: spec.home_policy,
            },
            compensate,
        ));
    }

    // An account never ends up passwordless: either the supplied
    // credential is set, or the credential is locked.
    match &spec.credential {
        Some(credential) => steps.push(Step::new(
            Action::SetCredential {
                username: username.clone(),
                credential: credential.clone(),
            },
            None,
        )),
        None => steps.push(Step::new(
            Action::LockCredential {
                username: username.clone(),
            },
            None,
        )),
    }

    Ok(TransactionPlan {
        operation: OperationKind::Create,
        username,
        steps,
    })
}

fn plan_delete(
    username: &str,
    remove_home: bool,
    observed: &Observation,
) -> Result<TransactionPlan> {
    let identity = observed
        .identity
        .as_ref()
        .ok_or_else(|| UsermuxError::NotFound(username.to_string()))?;

    let mut steps = Vec::with_capacity(2);

    if remove_home {
        let path = identity.home_dir.clone().ok_or_else(|| {
            UsermuxError::PathConflict(format!(
                "account {} records no home directory to remove",
                username
            ))
        })?;
        steps.push(Step::new(
            Action::RemoveHome {
                username: username.to_string(),
                path: path.clone(),
            },
            Some(Action::CreateHome {
                username: username.to_string(),
                path,
                policy: HomePolicy::Create,
            }),
        ));
    }

    // Last step of the plan, so no later failure can require undoing it,
    // and a deleted account's credential could not be restored anyway.
    steps.push(Step::new(
        Action::EnsureAbsent {
            username: username.to_string(),
        },
        None,
    ));

    Ok(TransactionPlan {
        operation: OperationKind::Delete,
        username: username.to_string(),
        steps,
    })
}

fn plan_set_password(
    username: &str,
    credential: &Credential,
    observed: &Observation,
) -> Result<TransactionPlan> {
    if credential.is_empty() {
        return Err(UsermuxError::InvalidCredential(
            "credential must not be empty".to_string(),
        ));
    }
    if observed.identity.is_none() {
        return Err(UsermuxError::NotFound(username.to_string()));
    }

    // The previous credential is unknowable, so this step cannot be
    // compensated. It is also the only step, so nothing can fail after it.
    let steps = vec![Step::new(
        Action::SetCredential {
            username: username.to_string(),
            credential: credential.clone(),
        },
        None,
    )];

    Ok(TransactionPlan {
        operation: OperationKind::SetPassword,
        username: username.to_string(),
        steps,
    })
}
