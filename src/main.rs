//! usermux command-line interface.
//!
//! Thin shell around [`AccountEngine`]: parse arguments, check privilege,
//! prompt for a password where the flags left one out, run the operation,
//! and turn the outcome into an exit code. Parse errors exit 2 (clap's
//! convention); any engine failure exits 1.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use usermux::{AccountEngine, AccountSpec, Config, Credential, HomePolicy, UsermuxError};

/// Transactional local-account management.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Login shell assigned when `create` does not pass --shell
    #[arg(long, global = true, value_name = "SHELL")]
    default_shell: Option<String>,

    /// Base directory for default home paths (<base>/<username>)
    #[arg(long, global = true, value_name = "DIR")]
    home_base: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account (entry, home directory, credential - all or nothing)
    Create {
        /// Account name
        username: String,
        /// Password to set; omitted means the account is created with a
        /// locked credential (no login possible)
        #[arg(short, long)]
        password: Option<String>,
        /// Login shell
        #[arg(short, long)]
        shell: Option<String>,
        /// Home directory path
        #[arg(long, value_name = "DIR")]
        home_dir: Option<PathBuf>,
        /// Do not create a home directory
        #[arg(long)]
        no_create_home: bool,
        /// Create a system account
        #[arg(long)]
        system: bool,
        /// Description stored on the entry
        #[arg(short, long)]
        comment: Option<String>,
    },

    /// Delete an account
    Delete {
        /// Account name
        username: String,
        /// Also remove the home directory
        #[arg(short, long)]
        remove_home: bool,
    },

    /// Set an account's password
    Password {
        /// Account name
        username: String,
        /// New password; prompted for (with confirmation) when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// List accounts
    List {
        /// Only show usernames containing this substring (case-insensitive)
        #[arg(short, long)]
        pattern: Option<String>,
    },
}

/// Mutating subcommands need root on Unix; `list` works unprivileged.
#[cfg(unix)]
fn check_privilege(command: &Commands) -> Result<(), UsermuxError> {
    if matches!(command, Commands::List { .. }) {
        return Ok(());
    }
    match sudo::check() {
        sudo::RunningAs::Root => Ok(()),
        _ => Err(UsermuxError::PermissionDenied(
            "account operations require root; re-run with sudo".to_string(),
        )),
    }
}

#[cfg(not(unix))]
fn check_privilege(_command: &Commands) -> Result<(), UsermuxError> {
    // Windows reports access-denied from the backend itself.
    Ok(())
}

/// Prompts for a password with confirmation when the flag was omitted.
fn resolve_password(flag: Option<String>) -> Result<Credential, UsermuxError> {
    match flag {
        Some(password) => Ok(Credential::new(password)),
        None => {
            let password = dialoguer::Password::new()
                .with_prompt("New password")
                .with_confirmation("Confirm password", "passwords do not match")
                .interact()
                .map_err(|e| {
                    UsermuxError::InvalidCredential(format!("password prompt failed: {}", e))
                })?;
            Ok(Credential::new(password))
        }
    }
}

fn print_listing(listing: &[usermux::AccountIdentity]) {
    if listing.is_empty() {
        println!("no accounts found");
        return;
    }

    println!("{:<32} {:>8}  {}", "USERNAME", "ID", "DESCRIPTION");
    for identity in listing {
        println!(
            "{:<32} {:>8}  {}",
            identity.username,
            identity.uid,
            identity.description.as_deref().unwrap_or("-")
        );
    }
}

fn fail(err: &UsermuxError) -> ! {
    eprintln!("error: {}", err);
    std::process::exit(1);
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("usermux=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = check_privilege(&cli.command) {
        fail(&err);
    }

    usermux::init();

    let mut config = Config::default();
    if let Some(shell) = cli.default_shell {
        config = config.with_default_shell(shell);
    }
    if let Some(base) = cli.home_base {
        config = config.with_home_base(base);
    }

    let mut engine = match AccountEngine::from_config(config) {
        Ok(engine) => engine,
        Err(err) => fail(&err),
    };
    if let Err(err) = engine.probe().await {
        fail(&err);
    }

    let outcome = match cli.command {
        Commands::Create {
            username,
            password,
            shell,
            home_dir,
            no_create_home,
            system,
            comment,
        } => {
            let mut spec = AccountSpec::new(username);
            if let Some(password) = password {
                spec = spec.with_credential(password);
            }
            if let Some(shell) = shell {
                spec = spec.with_shell(shell);
            }
            if let Some(home_dir) = home_dir {
                spec = spec.with_home_dir(home_dir);
            }
            if no_create_home {
                spec = spec.with_home_policy(HomePolicy::Skip);
            }
            if system {
                spec = spec.system();
            }
            if let Some(comment) = comment {
                spec = spec.with_comment(comment);
            }

            let outcome = engine.create(spec).await;
            if outcome.success {
                println!("created account {}", outcome.username);
            }
            outcome
        }

        Commands::Delete {
            username,
            remove_home,
        } => {
            let outcome = engine.delete(&username, remove_home).await;
            if outcome.success {
                println!("deleted account {}", outcome.username);
            }
            outcome
        }

        Commands::Password { username, password } => {
            let credential = match resolve_password(password) {
                Ok(credential) => credential,
                Err(err) => fail(&err),
            };
            let outcome = engine.set_password(&username, credential).await;
            if outcome.success {
                println!("password updated for {}", outcome.username);
            }
            outcome
        }

        Commands::List { pattern } => {
            match engine.list(pattern.as_deref()).await {
                Ok(listing) => print_listing(&listing),
                Err(err) => fail(&err),
            }
            return;
        }
    };

    if !outcome.success {
        let err = outcome
            .error
            .unwrap_or_else(|| UsermuxError::Other(anyhow::anyhow!("operation failed")));
        for residue in &outcome.compensation_failures {
            eprintln!("warning: {}", residue);
        }
        fail(&err);
    }
}
