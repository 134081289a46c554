//! POSIX backend implementation.

use crate::exec::{check_command_exists, run_command, run_command_with_stdin};
use crate::{
    AccountBackend, AccountClass, AccountIdentity, AccountSpec, Config, Credential, HomePolicy,
    Result, UsermuxError,
};
use async_trait::async_trait;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

/// Tools a mutation-capable host must provide.
const REQUIRED_TOOLS: [&str; 5] = ["getent", "useradd", "userdel", "usermod", "chpasswd"];

/// POSIX shadow-utils backend.
///
/// Every mutation shells out to the matching system tool; every query goes
/// through `getent`, so NSS sources beyond `/etc/passwd` (LDAP, SSSD) are
/// visible too. The backend holds no state of its own.
pub struct PosixBackend;

/// One parsed `getent passwd` line: `name:x:uid:gid:gecos:home:shell`.
struct PasswdEntry {
    identity: AccountIdentity,
    gid: u32,
}

fn parse_passwd_line(line: &str) -> Option<PasswdEntry> {
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() < 7 {
        return None;
    }

    let uid = fields[2].parse().ok()?;
    let gid = fields[3].parse().ok()?;
    let gecos = fields[4];
    let home = fields[5];

    Some(PasswdEntry {
        identity: AccountIdentity {
            username: fields[0].to_string(),
            uid,
            description: if gecos.is_empty() {
                None
            } else {
                Some(gecos.to_string())
            },
            home_dir: if home.is_empty() {
                None
            } else {
                Some(PathBuf::from(home))
            },
        },
        gid,
    })
}

/// Builds the `useradd` argument list for a spec.
///
/// Always passes `-M`: the entry records the home path via `-d`, but the
/// directory itself is materialized by a separate home step so it can be
/// rolled back on its own.
fn useradd_args(spec: &AccountSpec) -> Vec<String> {
    let mut args = vec!["-M".to_string()];
    if spec.class == AccountClass::System {
        args.push("-r".to_string());
    }
    if let Some(shell) = &spec.shell {
        args.push("-s".to_string());
        args.push(shell.clone());
    }
    if let Some(home) = &spec.home_dir {
        args.push("-d".to_string());
        args.push(home.to_string_lossy().into_owned());
    }
    if let Some(comment) = &spec.comment {
        args.push("-c".to_string());
        args.push(comment.clone());
    }
    args.push(spec.username.clone());
    args
}

/// Maps `useradd` exit codes onto the error taxonomy.
fn map_useradd_error(err: UsermuxError, username: &str) -> UsermuxError {
    match &err {
        UsermuxError::CommandFailed { code, stderr, .. } => match code {
            9 => UsermuxError::AlreadyExists(username.to_string()),
            3 => UsermuxError::InvalidName(stderr.clone()),
            12 => UsermuxError::PathConflict(stderr.clone()),
            1 | 10 => UsermuxError::PermissionDenied(stderr.clone()),
            _ => err,
        },
        _ => err,
    }
}

/// Maps `userdel` exit codes onto the error taxonomy.
fn map_userdel_error(err: UsermuxError, username: &str) -> UsermuxError {
    match &err {
        UsermuxError::CommandFailed { code, stderr, .. } => match code {
            6 => UsermuxError::NotFound(username.to_string()),
            8 => UsermuxError::AccountInUse(username.to_string()),
            12 => UsermuxError::PathConflict(stderr.clone()),
            1 | 10 => UsermuxError::PermissionDenied(stderr.clone()),
            _ => err,
        },
        _ => err,
    }
}

/// Maps `usermod` exit codes onto the error taxonomy.
fn map_usermod_error(err: UsermuxError, username: &str) -> UsermuxError {
    match &err {
        UsermuxError::CommandFailed { code, stderr, .. } => match code {
            6 => UsermuxError::NotFound(username.to_string()),
            1 | 10 => UsermuxError::PermissionDenied(stderr.clone()),
            _ => err,
        },
        _ => err,
    }
}

/// Maps `chpasswd` failures onto the error taxonomy.
///
/// `chpasswd` exits 1 for nearly everything, so classification sniffs the
/// stderr text: "does not exist" for unknown accounts, lock/permission
/// wording for privilege problems, PAM wording for policy refusals.
fn map_chpasswd_error(err: UsermuxError, username: &str) -> UsermuxError {
    match &err {
        UsermuxError::CommandFailed { stderr, .. } => {
            let text = stderr.to_lowercase();
            if text.contains("does not exist") || text.contains("unknown user") {
                UsermuxError::NotFound(username.to_string())
            } else if text.contains("permission") || text.contains("cannot lock") {
                UsermuxError::PermissionDenied(stderr.clone())
            } else if text.contains("bad password") || text.contains("pam") {
                UsermuxError::PolicyRejected(stderr.clone())
            } else {
                err
            }
        }
        _ => err,
    }
}

/// Promotes filesystem permission errors into the taxonomy; other I/O
/// failures pass through with the path attached.
fn map_io_error(err: std::io::Error, path: &Path) -> UsermuxError {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        UsermuxError::PermissionDenied(format!("{}: {}", path.display(), err))
    } else {
        UsermuxError::Io(err)
    }
}

impl PosixBackend {
    /// Creates a new POSIX backend.
    pub fn new(_config: Config) -> Self {
        Self
    }

    async fn lookup_entry(&self, username: &str) -> Result<Option<PasswdEntry>> {
        match run_command("getent", &["passwd", username]).await {
            Ok(output) => {
                let line = output.lines().next().unwrap_or_default();
                match parse_passwd_line(line) {
                    Some(entry) => Ok(Some(entry)),
                    None => Err(UsermuxError::Other(anyhow::anyhow!(
                        "unparseable passwd entry for {}",
                        username
                    ))),
                }
            }
            // getent exits 2 when the key is simply not present.
            Err(UsermuxError::CommandFailed { code: 2, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Hands the directory to the account (non-recursive).
    async fn chown_to(&self, username: &str, path: &Path) -> Result<()> {
        let entry = self
            .lookup_entry(username)
            .await?
            .ok_or_else(|| UsermuxError::NotFound(username.to_string()))?;
        std::os::unix::fs::chown(path, Some(entry.identity.uid), Some(entry.gid))
            .map_err(|e| map_io_error(e, path))?;
        Ok(())
    }
}

#[async_trait]
impl AccountBackend for PosixBackend {
    fn name(&self) -> &str {
        "posix"
    }

    async fn probe(&self) -> Result<()> {
        for tool in REQUIRED_TOOLS {
            if !check_command_exists(tool).await? {
                return Err(UsermuxError::BackendUnavailable(format!(
                    "{} command not found - install shadow-utils",
                    tool
                )));
            }
        }
        Ok(())
    }

    async fn lookup(&self, username: &str) -> Result<Option<AccountIdentity>> {
        Ok(self
            .lookup_entry(username)
            .await?
            .map(|entry| entry.identity))
    }

    async fn enumerate(&self, pattern: Option<&str>) -> Result<Vec<AccountIdentity>> {
        let output = run_command("getent", &["passwd"]).await?;
        let needle = pattern.map(str::to_lowercase);

        let mut listing: Vec<AccountIdentity> = output
            .lines()
            .filter_map(parse_passwd_line)
            .map(|entry| entry.identity)
            .filter(|identity| match &needle {
                Some(p) => identity.username.to_lowercase().contains(p),
                None => true,
            })
            .collect();
        listing.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(listing)
    }

    async fn create_account(&mut self, spec: &AccountSpec) -> Result<()> {
        let args = useradd_args(spec);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        run_command("useradd", &arg_refs)
            .await
            .map_err(|e| map_useradd_error(e, &spec.username))?;
        Ok(())
    }

    async fn delete_account(&mut self, username: &str) -> Result<()> {
        // No -r: the home directory is a separate step with its own
        // ownership guard.
        run_command("userdel", &[username])
            .await
            .map_err(|e| map_userdel_error(e, username))?;
        Ok(())
    }

    async fn set_credential(&mut self, username: &str, credential: &Credential) -> Result<()> {
        // chpasswd reads `user:password` lines from stdin, keeping the
        // secret out of the process listing.
        let mut line = format!("{}:{}\n", username, credential.expose());
        let result = run_command_with_stdin("chpasswd", &[], &line).await;
        line.zeroize();

        result.map_err(|e| map_chpasswd_error(e, username))?;
        Ok(())
    }

    async fn lock_credential(&mut self, username: &str) -> Result<()> {
        run_command("usermod", &["-L", username])
            .await
            .map_err(|e| map_usermod_error(e, username))?;
        Ok(())
    }

    async fn ensure_home(
        &mut self,
        username: &str,
        path: &Path,
        policy: HomePolicy,
    ) -> Result<()> {
        match policy {
            HomePolicy::Skip => Ok(()),
            HomePolicy::Create => {
                if tokio::fs::try_exists(path)
                    .await
                    .map_err(|e| map_io_error(e, path))?
                {
                    return Err(UsermuxError::PathConflict(format!(
                        "{} already exists",
                        path.display()
                    )));
                }
                tokio::fs::create_dir_all(path)
                    .await
                    .map_err(|e| map_io_error(e, path))?;
                tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
                    .await
                    .map_err(|e| map_io_error(e, path))?;
                self.chown_to(username, path).await
            }
            HomePolicy::UseExisting => {
                if !tokio::fs::try_exists(path)
                    .await
                    .map_err(|e| map_io_error(e, path))?
                {
                    return Err(UsermuxError::PathConflict(format!(
                        "{} does not exist",
                        path.display()
                    )));
                }
                // Adopt in place: ownership moves to the account, contents
                // are left untouched.
                self.chown_to(username, path).await
            }
        }
    }

    async fn remove_home(&mut self, username: &str, path: &Path) -> Result<()> {
        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(UsermuxError::PathConflict(format!(
                    "{} does not exist",
                    path.display()
                )));
            }
            Err(e) => return Err(map_io_error(e, path)),
        };

        // Symlinked or non-directory homes are never followed or removed.
        if !metadata.is_dir() {
            return Err(UsermuxError::PathConflict(format!(
                "{} is not a directory",
                path.display()
            )));
        }

        // Refuse to delete anything the account does not own.
        let entry = self
            .lookup_entry(username)
            .await?
            .ok_or_else(|| UsermuxError::NotFound(username.to_string()))?;
        if metadata.uid() != entry.identity.uid {
            return Err(UsermuxError::PathConflict(format!(
                "{} is not owned by {}",
                path.display(),
                username
            )));
        }

        tokio::fs::remove_dir_all(path)
            .await
            .map_err(|e| map_io_error(e, path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BackendKind;

    fn backend() -> PosixBackend {
        PosixBackend::new(Config::new(BackendKind::Posix))
    }

    fn command_failed(program: &str, code: i32, stderr: &str) -> UsermuxError {
        UsermuxError::CommandFailed {
            program: program.to_string(),
            code,
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_parse_passwd_line() {
        let entry =
            parse_passwd_line("alice:x:1000:1000:Alice Example:/home/alice:/bin/bash").unwrap();

        assert_eq!(entry.identity.username, "alice");
        assert_eq!(entry.identity.uid, 1000);
        assert_eq!(entry.gid, 1000);
        assert_eq!(entry.identity.description.as_deref(), Some("Alice Example"));
        assert_eq!(
            entry.identity.home_dir.as_deref(),
            Some(Path::new("/home/alice"))
        );
    }

    #[test]
    fn test_parse_passwd_line_empty_optional_fields() {
        let entry = parse_passwd_line("svc:x:999:999:::").unwrap();

        assert!(entry.identity.description.is_none());
        assert!(entry.identity.home_dir.is_none());
    }

    #[test]
    fn test_parse_passwd_line_malformed() {
        assert!(parse_passwd_line("").is_none());
        assert!(parse_passwd_line("alice:x:1000").is_none());
        assert!(parse_passwd_line("alice:x:notanumber:1000:::").is_none());
    }

    #[test]
    fn test_useradd_args_minimal() {
        let spec = AccountSpec::new("alice").with_home_policy(HomePolicy::Skip);
        assert_eq!(useradd_args(&spec), vec!["-M", "alice"]);
    }

    #[test]
    fn test_useradd_args_full() {
        let spec = AccountSpec::new("svc-backup")
            .system()
            .with_shell("/usr/sbin/nologin")
            .with_home_dir("/var/lib/backup")
            .with_comment("nightly backups");

        assert_eq!(
            useradd_args(&spec),
            vec![
                "-M",
                "-r",
                "-s",
                "/usr/sbin/nologin",
                "-d",
                "/var/lib/backup",
                "-c",
                "nightly backups",
                "svc-backup"
            ]
        );
    }

    #[test]
    fn test_map_useradd_exit_codes() {
        let err = map_useradd_error(command_failed("useradd", 9, "already exists"), "alice");
        assert!(matches!(err, UsermuxError::AlreadyExists(_)));

        let err = map_useradd_error(command_failed("useradd", 3, "invalid name"), "x");
        assert!(matches!(err, UsermuxError::InvalidName(_)));

        let err = map_useradd_error(command_failed("useradd", 1, "cannot lock"), "x");
        assert!(matches!(err, UsermuxError::PermissionDenied(_)));

        let err = map_useradd_error(command_failed("useradd", 12, "cannot create"), "x");
        assert!(matches!(err, UsermuxError::PathConflict(_)));

        // Unrecognized codes pass through untouched.
        let err = map_useradd_error(command_failed("useradd", 4, "uid in use"), "x");
        assert!(matches!(err, UsermuxError::CommandFailed { code: 4, .. }));
    }

    #[test]
    fn test_map_userdel_exit_codes() {
        let err = map_userdel_error(command_failed("userdel", 6, "no such user"), "ghost");
        assert!(matches!(err, UsermuxError::NotFound(_)));

        let err = map_userdel_error(command_failed("userdel", 8, "logged in"), "alice");
        assert!(matches!(err, UsermuxError::AccountInUse(_)));
    }

    #[test]
    fn test_map_usermod_exit_codes() {
        let err = map_usermod_error(command_failed("usermod", 6, "no such user"), "ghost");
        assert!(matches!(err, UsermuxError::NotFound(_)));
    }

    #[test]
    fn test_map_chpasswd_stderr_sniffing() {
        let err = map_chpasswd_error(
            command_failed("chpasswd", 1, "chpasswd: line 1: user 'ghost' does not exist"),
            "ghost",
        );
        assert!(matches!(err, UsermuxError::NotFound(_)));

        let err = map_chpasswd_error(
            command_failed("chpasswd", 1, "chpasswd: cannot lock /etc/shadow"),
            "alice",
        );
        assert!(matches!(err, UsermuxError::PermissionDenied(_)));

        let err = map_chpasswd_error(
            command_failed(
                "chpasswd",
                1,
                "BAD PASSWORD: it is based on a dictionary word",
            ),
            "alice",
        );
        assert!(matches!(err, UsermuxError::PolicyRejected(_)));

        let err = map_chpasswd_error(
            command_failed("chpasswd", 1, "pam_chauthtok() failed"),
            "alice",
        );
        assert!(matches!(err, UsermuxError::PolicyRejected(_)));
    }

    #[tokio::test]
    async fn test_ensure_home_create_conflicts_on_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = backend();

        let result = backend
            .ensure_home("alice", dir.path(), HomePolicy::Create)
            .await;
        assert!(matches!(result, Err(UsermuxError::PathConflict(_))));
    }

    #[tokio::test]
    async fn test_ensure_home_use_existing_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("never-created");
        let mut backend = backend();

        let result = backend
            .ensure_home("alice", &missing, HomePolicy::UseExisting)
            .await;
        assert!(matches!(result, Err(UsermuxError::PathConflict(_))));
    }

    #[tokio::test]
    async fn test_remove_home_refuses_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let mut backend = backend();

        let result = backend.remove_home("alice", &missing).await;
        assert!(matches!(result, Err(UsermuxError::PathConflict(_))));
    }

    #[tokio::test]
    async fn test_remove_home_refuses_non_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("regular-file");
        tokio::fs::write(&file, b"not a home").await.unwrap();
        let mut backend = backend();

        let result = backend.remove_home("alice", &file).await;
        match result {
            Err(UsermuxError::PathConflict(msg)) => {
                assert!(msg.contains("not a directory"));
            }
            other => panic!("expected PathConflict, got {:?}", other),
        }
    }
}
