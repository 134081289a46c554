//! Usermux - Transactional local-account management.
//!
//! Usermux wraps the host's native account primitives (POSIX shadow-utils,
//! Windows local accounts) in a single capability trait and runs every
//! mutation as a transaction: operations are planned as ordered reversible
//! steps, and a failure part-way through rolls back everything that
//! already applied. A failed `useradd`-then-`chpasswd` sequence can no
//! longer strand a half-configured account.
//!
//! # Features
//!
//! - **Unified API**: One [`AccountBackend`] trait over every platform
//! - **Transactional**: Forward steps carry compensations; failures unwind
//!   in reverse order
//! - **Live state**: Existence is re-queried before every operation, never
//!   cached across them
//! - **Structured outcomes**: Every operation returns an [`Outcome`] value;
//!   the engine never panics or exits
//! - **Feature Flags**: Optional backend compilation to minimize dependencies
//!
//! # Quick Start
//!
//! ```no_run
//! use usermux::{AccountEngine, AccountSpec, BackendKind, Config};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> usermux::Result<()> {
//!     usermux::init();
//!
//!     let config = Config::new(BackendKind::Posix);
//!     let mut engine = AccountEngine::from_config(config)?;
//!     engine.probe().await?;
//!
//!     // Create an account: entry, home directory, credential - or none
//!     // of them, if any step fails.
//!     let spec = AccountSpec::new("deploy")
//!         .with_credential("s3cr3t")
//!         .with_comment("deployment robot");
//!     let outcome = engine.create(spec).await;
//!
//!     if outcome.success {
//!         println!("created {} ({:?})", outcome.username, outcome.applied);
//!     } else {
//!         eprintln!("create failed: {:?}", outcome.error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Supported Backends
//!
//! | Backend | Feature Flag | Requires | Notes |
//! |---------|-------------|----------|-------|
//! | Mock | `mock` (default) | None | In-memory testing backend with error injection |
//! | POSIX | `posix` | shadow-utils, `getent`, root | Unix only |
//! | Windows local accounts | `winlocal` | PowerShell `LocalAccounts` module | Stub elsewhere |
//!
//! # Feature Flags
//!
//! All three backends are on by default. Trim them in `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! usermux = { version = "0.1", default-features = false, features = ["posix"] }
//! ```

pub mod account;
pub mod backend;
pub mod backends;
pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod executor;
pub mod factory;
pub mod planner;
pub mod validation;

pub use account::{AccountClass, AccountIdentity, AccountSpec, Credential, HomePolicy};
pub use backend::AccountBackend;
pub use config::{BackendKind, Config};
pub use engine::{AccountEngine, Outcome};
pub use error::{Result, UsermuxError};
pub use planner::{OperationKind, StepKind};

use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes the usermux library.
///
/// This registers all compiled backends with the factory. Call it once
/// before building an engine from configuration; calling it again is a
/// no-op.
pub fn init() {
    INIT.call_once(backends::register_all);
}
