//! Subprocess plumbing for tool-based backends.
//!
//! The POSIX backend delegates every mutation to a system tool
//! (`useradd`, `userdel`, `chpasswd`, ...). These helpers run one tool
//! invocation with piped stdio, surface the exit code and stderr so the
//! backend can map them onto the error taxonomy, and enforce a coarse
//! timeout so a hung PAM conversation cannot wedge the engine.

use crate::{Result, UsermuxError};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Ceiling on a single tool invocation.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes a command and returns stdout as a string.
///
/// # Errors
///
/// - [`UsermuxError::BackendUnavailable`] when the program is not installed
/// - [`UsermuxError::CommandFailed`] on non-zero exit (carries the exit
///   code and trimmed stderr for the caller to map) or timeout
pub async fn run_command(program: &str, args: &[&str]) -> Result<String> {
    run_command_timed(program, args, None, COMMAND_TIMEOUT).await
}

/// Executes a command, feeding `stdin_data` to its standard input.
///
/// Used for tools that read secrets from stdin (`chpasswd`) so the secret
/// never appears in an argument list or process listing.
pub async fn run_command_with_stdin(
    program: &str,
    args: &[&str],
    stdin_data: &str,
) -> Result<String> {
    run_command_timed(program, args, Some(stdin_data), COMMAND_TIMEOUT).await
}

async fn run_command_timed(
    program: &str,
    args: &[&str],
    stdin_data: Option<&str>,
    timeout: Duration,
) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(if stdin_data.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    // If the timeout fires and the future is dropped, reap the child too.
    cmd.kill_on_drop(true);

    let fut = async {
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                UsermuxError::BackendUnavailable(format!("{} command not found", program))
            } else {
                UsermuxError::Io(e)
            }
        })?;

        if let Some(data) = stdin_data {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(data.as_bytes()).await.map_err(UsermuxError::Io)?;
                stdin.flush().await.map_err(UsermuxError::Io)?;
                // Dropping the handle closes the pipe so the tool sees EOF.
            }
        }

        child.wait_with_output().await.map_err(UsermuxError::Io)
    };

    let output = match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(UsermuxError::CommandFailed {
                program: program.to_string(),
                code: -1,
                stderr: format!("timed out after {:?}", timeout),
            })
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(UsermuxError::CommandFailed {
            program: program.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }

    String::from_utf8(output.stdout)
        .map_err(|e| UsermuxError::Other(anyhow::anyhow!("invalid UTF-8 in {} output: {}", program, e)))
}

/// Checks whether a command-line tool is available in PATH.
///
/// # Example
///
/// ```no_run
/// use usermux::exec::check_command_exists;
///
/// #[tokio::main]
/// async fn main() -> usermux::Result<()> {
///     if !check_command_exists("useradd").await? {
///         println!("shadow-utils are not installed");
///     }
///     Ok(())
/// }
/// ```
pub async fn check_command_exists(program: &str) -> Result<bool> {
    let status = Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(UsermuxError::Io)?;

    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_command_success() {
        let output = run_command("echo", &["hello"]).await.unwrap();
        assert_eq!(output.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_command_not_found() {
        let result = run_command("nonexistent-command-12345", &[]).await;
        assert!(matches!(result, Err(UsermuxError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn test_run_command_nonzero_exit_carries_code() {
        let result = run_command("false", &[]).await;
        match result {
            Err(UsermuxError::CommandFailed { program, code, .. }) => {
                assert_eq!(program, "false");
                assert_eq!(code, 1);
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_command_with_stdin() {
        let output = run_command_with_stdin("cat", &[], "hello from stdin")
            .await
            .unwrap();
        assert_eq!(output.trim(), "hello from stdin");
    }

    #[tokio::test]
    async fn test_run_command_timeout() {
        let result =
            run_command_timed("sleep", &["5"], None, Duration::from_millis(50)).await;
        match result {
            Err(UsermuxError::CommandFailed { code, stderr, .. }) => {
                assert_eq!(code, -1);
                assert!(stderr.contains("timed out"));
            }
            other => panic!("expected timeout failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_command_exists() {
        assert!(check_command_exists("echo").await.unwrap());
        assert!(!check_command_exists("nonexistent-command-12345")
            .await
            .unwrap());
    }
}
