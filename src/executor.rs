//! Transaction execution with rollback.
//!
//! The executor walks a plan's steps in order, keeping an undo stack of
//! what has applied so far. On the first failure it stops, then replays
//! the recorded compensations in reverse order. A compensation that fails
//! is reported and skipped; the unwind always visits every remaining
//! entry, so one stuck rollback step cannot strand the steps behind it.

use crate::planner::{Action, Step, StepKind, TransactionPlan};
use crate::{AccountBackend, Result, UsermuxError};

/// What happened when a plan ran.
///
/// `error` is the primary failure (the step that broke the transaction);
/// `compensation_failures` are secondary and only ever appear alongside
/// it. A report with no error means every step applied.
#[derive(Debug)]
pub struct ExecutionReport {
    /// Steps that applied, in execution order. On success this covers the
    /// whole plan; on failure, the prefix that ran before the failing step.
    pub applied: Vec<StepKind>,
    /// The step that failed, if any.
    pub failed_step: Option<StepKind>,
    /// The primary error, if any.
    pub error: Option<UsermuxError>,
    /// Compensations that themselves failed during the unwind, leaving
    /// residue for the operator to clean up.
    pub compensation_failures: Vec<UsermuxError>,
}

impl ExecutionReport {
    /// True when every planned step applied.
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    fn completed(applied: Vec<StepKind>) -> Self {
        Self {
            applied,
            failed_step: None,
            error: None,
            compensation_failures: Vec::new(),
        }
    }
}

/// Runs a plan against a backend, rolling back on failure.
///
/// Steps execute strictly in plan order, one at a time. This function
/// never returns `Err`: failures are part of the report, so callers get
/// the full picture (primary error plus any rollback residue) instead of
/// the first error alone.
pub async fn run(backend: &mut dyn AccountBackend, plan: &TransactionPlan) -> ExecutionReport {
    let mut undo: Vec<&Step> = Vec::with_capacity(plan.steps.len());
    let mut applied = Vec::with_capacity(plan.steps.len());

    for step in &plan.steps {
        tracing::debug!(
            username = %plan.username,
            step = %step.kind(),
            "applying step"
        );
        match apply(backend, &step.forward).await {
            Ok(()) => {
                applied.push(step.kind());
                undo.push(step);
            }
            Err(err) => {
                tracing::warn!(
                    username = %plan.username,
                    step = %step.kind(),
                    error = %err,
                    "step failed, rolling back {} applied step(s)",
                    undo.len()
                );
                let compensation_failures = unwind(backend, &undo).await;
                return ExecutionReport {
                    applied,
                    failed_step: Some(step.kind()),
                    error: Some(err),
                    compensation_failures,
                };
            }
        }
    }

    ExecutionReport::completed(applied)
}

/// Replays compensations for applied steps, most recent first.
async fn unwind(backend: &mut dyn AccountBackend, undo: &[&Step]) -> Vec<UsermuxError> {
    let mut failures = Vec::new();

    for step in undo.iter().rev() {
        let Some(compensate) = &step.compensate else {
            continue;
        };
        tracing::debug!(step = %step.kind(), "compensating");
        if let Err(err) = apply(backend, compensate).await {
            tracing::error!(
                step = %step.kind(),
                error = %err,
                "compensation failed, continuing unwind"
            );
            failures.push(UsermuxError::compensation(step.kind(), err));
        }
    }

    failures
}

/// Turns one action into the corresponding backend call.
///
/// Forward steps and compensations both come through here, so the two
/// directions cannot drift apart.
async fn apply(backend: &mut dyn AccountBackend, action: &Action) -> Result<()> {
    match action {
        Action::EnsurePresent { spec } => backend.create_account(spec).await,
        Action::EnsureAbsent { username } => backend.delete_account(username).await,
        Action::SetCredential {
            username,
            credential,
        } => backend.set_credential(username, credential).await,
        Action::LockCredential { username } => backend.lock_credential(username).await,
        Action::CreateHome {
            username,
            path,
            policy,
        } => backend.ensure_home(username, path, *policy).await,
        Action::RemoveHome { username, path } => backend.remove_home(username, path).await,
    }
}
