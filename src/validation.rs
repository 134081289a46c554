//! Username validation, shared by the engine and every backend.
//!
//! Usernames travel into subprocess argument lists (`useradd`, `userdel`)
//! and interpolated PowerShell scripts, so validation is an allowlist: a
//! name is accepted only when every character is unambiguous on both
//! platforms. Backends still apply their own native rules on top (the OS
//! is the final authority); this layer exists to reject anything that
//! could be misparsed before it reaches a command line.

use crate::{Result, UsermuxError};

/// Maximum username length accepted by shadow-utils (`useradd`).
const MAX_USERNAME_LENGTH: usize = 32;

/// Validates an account username.
///
/// Accepted: ASCII letters, digits, `.`, `_`, `-`, and a trailing `$`
/// (Samba machine accounts), not starting with `-` (would be parsed as a
/// flag) or `.`.
///
/// # Errors
///
/// Returns [`UsermuxError::InvalidName`] if validation fails.
///
/// # Example
///
/// ```
/// use usermux::validation::validate_username;
///
/// assert!(validate_username("alice").is_ok());
/// assert!(validate_username("svc-backup_01").is_ok());
/// assert!(validate_username("winhost$").is_ok());
///
/// assert!(validate_username("").is_err());
/// assert!(validate_username("-oops").is_err());
/// assert!(validate_username("alice; rm -rf /").is_err());
/// ```
pub fn validate_username(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(UsermuxError::InvalidName(
            "username cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_USERNAME_LENGTH {
        return Err(UsermuxError::InvalidName(format!(
            "username exceeds maximum length of {} characters",
            MAX_USERNAME_LENGTH
        )));
    }

    let first = name.chars().next().unwrap_or_default();
    if first == '-' || first == '.' {
        return Err(UsermuxError::InvalidName(format!(
            "username cannot start with '{}'",
            first
        )));
    }

    for (index, ch) in name.char_indices() {
        let allowed = ch.is_ascii_alphanumeric()
            || ch == '.'
            || ch == '_'
            || ch == '-'
            // trailing $ only (machine account convention)
            || (ch == '$' && index == name.len() - 1);
        if !allowed {
            return Err(UsermuxError::InvalidName(format!(
                "username contains disallowed character '{}'",
                ch.escape_default()
            )));
        }
    }

    Ok(())
}
