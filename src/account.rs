//! Account data structures shared by the engine and backends.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// A live view of an account entry as the backend reports it.
///
/// Identities are re-queried at the start of every operation and never
/// cached across operations: existence is whatever `lookup` said a moment
/// ago, not what a previous invocation remembered.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AccountIdentity {
    /// Account name, already in the backend's canonical form
    pub username: String,

    /// Numeric identifier assigned by the backend (uid on POSIX, the SID's
    /// relative identifier on Windows). Immutable once created.
    pub uid: u32,

    /// Free-form description (GECOS field / account description)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Home directory the entry records, if the backend tracks one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_dir: Option<PathBuf>,
}

/// An account secret.
///
/// Wraps the plaintext so it is wiped from memory on drop and can never
/// reach a log record: both `Debug` and `Display` print a fixed redaction
/// marker. There is deliberately no `Serialize` implementation.
#[derive(Clone)]
pub struct Credential(Zeroizing<String>);

impl Credential {
    /// Creates a credential from plaintext.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// Exposes the plaintext for handing to a backend.
    ///
    /// Call sites should pass the result straight into the subprocess or
    /// API boundary rather than storing it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True when the wrapped secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Eq for Credential {}

impl From<&str> for Credential {
    fn from(secret: &str) -> Self {
        Self::new(secret)
    }
}

/// What the engine should do about the account's home directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HomePolicy {
    /// Create the directory; it must not already exist
    Create,
    /// Leave home directories alone entirely
    Skip,
    /// Adopt a directory that already exists (ownership is fixed up,
    /// contents are left untouched)
    UseExisting,
}

impl Default for HomePolicy {
    fn default() -> Self {
        Self::Create
    }
}

impl fmt::Display for HomePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Skip => write!(f, "skip"),
            Self::UseExisting => write!(f, "use-existing"),
        }
    }
}

/// Account class, matching the host's normal/system split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountClass {
    /// Regular interactive account
    Normal,
    /// System/service account (e.g. `useradd -r`)
    System,
}

impl Default for AccountClass {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for AccountClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::System => write!(f, "system"),
        }
    }
}

/// Desired-state descriptor for account creation.
///
/// Built once per invocation and discarded with the outcome. Use the
/// builder methods for ergonomic construction:
///
/// ```
/// use usermux::{AccountSpec, HomePolicy};
///
/// let spec = AccountSpec::new("deploy")
///     .with_credential("s3cr3t")
///     .with_shell("/bin/sh")
///     .with_comment("deployment robot")
///     .with_home_policy(HomePolicy::Skip);
///
/// assert_eq!(spec.username, "deploy");
/// assert!(spec.credential.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct AccountSpec {
    /// Account name (normalized by the engine before planning)
    pub username: String,

    /// Secret to set. `None` means the engine locks the credential so the
    /// account can never sit in an ambiguous blank-password state.
    pub credential: Option<Credential>,

    /// Login shell / login program
    pub shell: Option<String>,

    /// Home directory path. `None` lets the engine resolve the configured
    /// default; the planner itself never infers a path.
    pub home_dir: Option<PathBuf>,

    /// Home directory handling
    pub home_policy: HomePolicy,

    /// Normal or system account
    pub class: AccountClass,

    /// Free-form description stored on the entry
    pub comment: Option<String>,
}

impl AccountSpec {
    /// Creates a spec with defaults: no credential (locked login), engine
    /// default shell and home path, home policy `Create`, class `Normal`.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            credential: None,
            shell: None,
            home_dir: None,
            home_policy: HomePolicy::default(),
            class: AccountClass::default(),
            comment: None,
        }
    }

    /// Sets the credential to apply after the entry is created.
    pub fn with_credential(mut self, secret: impl Into<Credential>) -> Self {
        self.credential = Some(secret.into());
        self
    }

    /// Sets the login shell.
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    /// Sets an explicit home directory path. Explicit paths always win
    /// over configured defaults.
    pub fn with_home_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(path.into());
        self
    }

    /// Sets the home directory policy.
    pub fn with_home_policy(mut self, policy: HomePolicy) -> Self {
        self.home_policy = policy;
        self
    }

    /// Marks the account as a system account.
    pub fn system(mut self) -> Self {
        self.class = AccountClass::System;
        self
    }

    /// Sets the entry's description/comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

impl From<String> for Credential {
    fn from(secret: String) -> Self {
        Self::new(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_redacted_in_debug_and_display() {
        let secret = Credential::new("hunter2");
        assert_eq!(format!("{:?}", secret), "Credential(<redacted>)");
        assert_eq!(secret.to_string(), "<redacted>");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_spec_debug_never_leaks_secret() {
        let spec = AccountSpec::new("alice").with_credential("hunter2");
        let rendered = format!("{:?}", spec);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn test_spec_builder_defaults() {
        let spec = AccountSpec::new("alice");
        assert_eq!(spec.username, "alice");
        assert!(spec.credential.is_none());
        assert!(spec.shell.is_none());
        assert!(spec.home_dir.is_none());
        assert_eq!(spec.home_policy, HomePolicy::Create);
        assert_eq!(spec.class, AccountClass::Normal);
    }

    #[test]
    fn test_spec_builder_overrides() {
        let spec = AccountSpec::new("svc-backup")
            .system()
            .with_home_dir("/var/lib/backup")
            .with_home_policy(HomePolicy::UseExisting)
            .with_comment("nightly backups");

        assert_eq!(spec.class, AccountClass::System);
        assert_eq!(spec.home_dir.as_deref(), Some(std::path::Path::new("/var/lib/backup")));
        assert_eq!(spec.home_policy, HomePolicy::UseExisting);
        assert_eq!(spec.comment.as_deref(), Some("nightly backups"));
    }

    #[test]
    fn test_empty_credential_detection() {
        assert!(Credential::new("").is_empty());
        assert!(!Credential::new("x").is_empty());
    }

    #[test]
    fn test_identity_serialization_skips_empty_fields() {
        let identity = AccountIdentity {
            username: "alice".to_string(),
            uid: 1000,
            description: None,
            home_dir: None,
        };
        let json = serde_json::to_string(&identity).unwrap();
        assert!(!json.contains("description"));
        assert!(!json.contains("home_dir"));
    }
}
