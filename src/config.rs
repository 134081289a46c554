//! Configuration types for backend initialization.

use std::collections::HashMap;
use std::path::PathBuf;

/// Backend kind identifier.
///
/// Each variant corresponds to a specific account backend implementation.
/// Backends must be enabled via Cargo feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// POSIX shadow-utils backend (requires `useradd`, `userdel`, `chpasswd`)
    Posix,
    /// Windows local accounts backend (Windows only, via PowerShell)
    WinLocal,
    /// In-memory mock backend for tests
    Mock,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Posix => write!(f, "posix"),
            Self::WinLocal => write!(f, "winlocal"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

/// Configuration for creating a backend and resolving account defaults.
///
/// Use the builder pattern for ergonomic configuration:
///
/// ```no_run
/// use usermux::{BackendKind, Config};
///
/// let config = Config::new(BackendKind::Posix)
///     .with_default_shell("/bin/zsh")
///     .with_home_base("/srv/home");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend kind
    pub backend: BackendKind,

    /// Login shell assigned when an account spec does not name one
    pub default_shell: String,

    /// Directory under which default home paths are resolved
    /// (`<home_base>/<username>`)
    pub home_base: PathBuf,

    /// Backend-specific options
    pub options: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: if cfg!(windows) {
                BackendKind::WinLocal
            } else {
                BackendKind::Posix
            },
            default_shell: "/bin/bash".to_string(),
            home_base: PathBuf::from("/home"),
            options: HashMap::new(),
        }
    }
}

impl Config {
    /// Creates a new configuration for the specified backend.
    ///
    /// # Example
    ///
    /// ```
    /// use usermux::{BackendKind, Config};
    ///
    /// let config = Config::new(BackendKind::Mock);
    /// assert_eq!(config.backend, BackendKind::Mock);
    /// ```
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Default::default()
        }
    }

    /// Sets the login shell used when an account spec does not name one.
    pub fn with_default_shell(mut self, shell: impl Into<String>) -> Self {
        self.default_shell = shell.into();
        self
    }

    /// Sets the base directory for default home paths.
    ///
    /// An account spec without an explicit home directory resolves to
    /// `<home_base>/<username>`.
    pub fn with_home_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.home_base = base.into();
        self
    }

    /// Adds a backend-specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Gets a backend-specific option value.
    pub fn get_option(&self, key: &str) -> Option<&String> {
        self.options.get(key)
    }
}
