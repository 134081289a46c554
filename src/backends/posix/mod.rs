//! POSIX shadow-utils backend.
//!
//! This backend drives the standard account tools every mainstream
//! distribution ships: `getent` for queries, `useradd`/`userdel` for the
//! account record, `chpasswd` for credentials, and `usermod -L` for
//! locking. Home directories are managed directly on the filesystem so
//! that creating the record and materializing the home stay separate,
//! individually reversible effects.
//!
//! # Requirements
//!
//! - shadow-utils (`useradd`, `userdel`, `usermod`, `chpasswd`)
//! - `getent` (glibc)
//! - Root privilege for mutations (queries work unprivileged)
//!
//! # Example
//!
//! ```no_run
//! use usermux::{factory, BackendKind, Config};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> usermux::Result<()> {
//!     usermux::init();
//!     let config = Config::new(BackendKind::Posix);
//!
//!     let backend = factory::new_backend(config)?;
//!     backend.probe().await?;
//!
//!     for identity in backend.enumerate(None).await? {
//!         println!("{} ({})", identity.username, identity.uid);
//!     }
//!     Ok(())
//! }
//! ```

mod backend;

pub use backend::PosixBackend;

/// Registers the POSIX backend with the factory.
pub fn register() {
    crate::factory::register_backend("posix", |cfg| Ok(Box::new(PosixBackend::new(cfg))));
}
