//! Windows local accounts backend.
//!
//! This backend drives the PowerShell `Microsoft.PowerShell.LocalAccounts`
//! cmdlets (`Get-LocalUser`, `New-LocalUser`, `Remove-LocalUser`,
//! `Set-LocalUser`, `Disable-LocalUser`) to manage local Windows accounts.
//!
//! # Platform Support
//!
//! Only available on Windows. On other platforms a stub is compiled whose
//! `probe` fails, so a misconfigured host reports `BackendUnavailable`
//! instead of failing to build.
//!
//! # Home directories
//!
//! Windows materializes a profile directory at first logon and offers no
//! supported way to pre-create or remove one through the local-account
//! cmdlets. `ensure_home` and `remove_home` therefore return
//! `PolicyRejected`; callers create accounts with the `Skip` home policy
//! on this backend.

#[cfg(target_os = "windows")]
mod backend;

#[cfg(target_os = "windows")]
pub use backend::WinLocalBackend;

#[cfg(not(target_os = "windows"))]
mod backend_stub;
#[cfg(not(target_os = "windows"))]
pub use backend_stub::WinLocalBackend;

use crate::factory;

/// Registers the Windows local accounts backend with the factory.
pub fn register() {
    factory::register_backend("winlocal", |config| {
        Ok(Box::new(WinLocalBackend::new(config)))
    });
}
