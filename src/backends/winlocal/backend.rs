//! Windows local accounts backend implementation.

use crate::exec::run_command_with_stdin;
use crate::{
    AccountBackend, AccountClass, AccountIdentity, AccountSpec, Config, Credential, HomePolicy,
    Result, UsermuxError,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use zeroize::Zeroize;

/// Windows local accounts backend.
///
/// Every call runs one PowerShell script through the `LocalAccounts`
/// module. Scripts are fed over stdin (`-Command -`) so that secrets and
/// account names never appear in the process listing.
pub struct WinLocalBackend;

/// One account as PowerShell reports it, already flattened to plain
/// fields by the query script.
#[derive(Deserialize)]
struct LocalUserRecord {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Sid")]
    sid: String,
    #[serde(rename = "Description")]
    description: Option<String>,
}

impl LocalUserRecord {
    fn into_identity(self) -> Result<AccountIdentity> {
        let rid = parse_rid(&self.sid)?;
        Ok(AccountIdentity {
            username: self.name.to_lowercase(),
            uid: rid,
            description: self.description.filter(|d| !d.is_empty()),
            // The profile directory is materialized at first logon; the
            // account record itself carries no home path.
            home_dir: None,
        })
    }
}

/// Extracts the relative identifier (the last subauthority) from a SID
/// string like `S-1-5-21-...-1001`.
fn parse_rid(sid: &str) -> Result<u32> {
    sid.rsplit('-')
        .next()
        .and_then(|rid| rid.parse().ok())
        .ok_or_else(|| UsermuxError::Other(anyhow::anyhow!("unparseable SID: {}", sid)))
}

/// Escapes a value for a single-quoted PowerShell string literal.
fn escape_powershell_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Maps a failed PowerShell invocation onto the error taxonomy.
///
/// The LocalAccounts cmdlets exit 1 for everything, so classification
/// sniffs the error text.
fn map_powershell_error(err: UsermuxError, username: &str) -> UsermuxError {
    match &err {
        UsermuxError::CommandFailed { stderr, .. } => {
            let text = stderr.to_lowercase();
            if text.contains("already exists") {
                UsermuxError::AlreadyExists(username.to_string())
            } else if text.contains("was not found") || text.contains("does not exist") {
                UsermuxError::NotFound(username.to_string())
            } else if text.contains("access") && text.contains("denied") {
                UsermuxError::PermissionDenied(stderr.clone())
            } else if text.contains("password does not meet") {
                UsermuxError::PolicyRejected(stderr.clone())
            } else {
                err
            }
        }
        _ => err,
    }
}

impl WinLocalBackend {
    /// Creates a new Windows local accounts backend.
    pub fn new(_config: Config) -> Self {
        Self
    }

    /// Runs a PowerShell script, feeding it over stdin.
    async fn run_powershell(&self, script: &str) -> Result<String> {
        run_command_with_stdin("powershell.exe", &["-NoProfile", "-Command", "-"], script).await
    }
}

#[async_trait]
impl AccountBackend for WinLocalBackend {
    fn name(&self) -> &str {
        "winlocal"
    }

    fn normalize_username(&self, raw: &str) -> String {
        // Windows account names are case-insensitive; fold once here so
        // comparisons and log records agree.
        raw.to_lowercase()
    }

    async fn probe(&self) -> Result<()> {
        let script = "if (Get-Command Get-LocalUser -ErrorAction SilentlyContinue) \
                      { exit 0 } else { exit 1 }";
        match self.run_powershell(script).await {
            Ok(_) => Ok(()),
            Err(UsermuxError::BackendUnavailable(e)) => Err(UsermuxError::BackendUnavailable(e)),
            Err(_) => Err(UsermuxError::BackendUnavailable(
                "the PowerShell LocalAccounts module is not available".to_string(),
            )),
        }
    }

    async fn lookup(&self, username: &str) -> Result<Option<AccountIdentity>> {
        let name = escape_powershell_string(username);
        let script = format!(
            r#"
$user = Get-LocalUser -Name '{}' -ErrorAction SilentlyContinue
if ($user) {{
    [PSCustomObject]@{{
        Name = $user.Name
        Sid = $user.SID.Value
        Description = $user.Description
    }} | ConvertTo-Json -Compress
}}
"#,
            name
        );

        let output = self.run_powershell(&script).await?;
        if output.trim().is_empty() {
            return Ok(None);
        }

        let record: LocalUserRecord = serde_json::from_str(output.trim())?;
        Ok(Some(record.into_identity()?))
    }

    async fn enumerate(&self, pattern: Option<&str>) -> Result<Vec<AccountIdentity>> {
        let script = r#"
Get-LocalUser | ForEach-Object {
    [PSCustomObject]@{
        Name = $_.Name
        Sid = $_.SID.Value
        Description = $_.Description
    }
} | ConvertTo-Json -Compress
"#;

        let output = self.run_powershell(script).await?;
        let trimmed = output.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        // ConvertTo-Json unwraps single-element pipelines to a bare object.
        let records: Vec<LocalUserRecord> = if trimmed.starts_with('[') {
            serde_json::from_str(trimmed)?
        } else {
            vec![serde_json::from_str(trimmed)?]
        };

        let needle = pattern.map(str::to_lowercase);
        let mut listing = records
            .into_iter()
            .map(LocalUserRecord::into_identity)
            .collect::<Result<Vec<_>>>()?;
        if let Some(p) = &needle {
            listing.retain(|identity| identity.username.contains(p.as_str()));
        }
        listing.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(listing)
    }

    async fn create_account(&mut self, spec: &AccountSpec) -> Result<()> {
        if spec.class == AccountClass::System {
            return Err(UsermuxError::PolicyRejected(
                "Windows local accounts have no system-account class".to_string(),
            ));
        }

        let name = escape_powershell_string(&spec.username);
        let description = escape_powershell_string(spec.comment.as_deref().unwrap_or(""));
        // -NoPassword creates the record without a usable credential;
        // the credential step sets or locks it afterwards.
        let script = format!(
            "New-LocalUser -Name '{}' -NoPassword -Description '{}' \
             -ErrorAction Stop | Out-Null",
            name, description
        );

        self.run_powershell(&script)
            .await
            .map_err(|e| map_powershell_error(e, &spec.username))?;
        Ok(())
    }

    async fn delete_account(&mut self, username: &str) -> Result<()> {
        let name = escape_powershell_string(username);
        let script = format!(
            "Remove-LocalUser -Name '{}' -ErrorAction Stop",
            name
        );

        self.run_powershell(&script)
            .await
            .map_err(|e| map_powershell_error(e, username))?;
        Ok(())
    }

    async fn set_credential(&mut self, username: &str, credential: &Credential) -> Result<()> {
        let name = escape_powershell_string(username);
        let secret = escape_powershell_string(credential.expose());
        // The script travels over stdin, so the plaintext never appears in
        // an argument list.
        let mut script = format!(
            r#"
$password = ConvertTo-SecureString -String '{}' -AsPlainText -Force
Set-LocalUser -Name '{}' -Password $password -ErrorAction Stop
Enable-LocalUser -Name '{}' -ErrorAction Stop
"#,
            secret, name, name
        );

        let result = self.run_powershell(&script).await;
        script.zeroize();

        result.map_err(|e| map_powershell_error(e, username))?;
        Ok(())
    }

    async fn lock_credential(&mut self, username: &str) -> Result<()> {
        let name = escape_powershell_string(username);
        let script = format!(
            "Disable-LocalUser -Name '{}' -ErrorAction Stop",
            name
        );

        self.run_powershell(&script)
            .await
            .map_err(|e| map_powershell_error(e, username))?;
        Ok(())
    }

    async fn ensure_home(
        &mut self,
        _username: &str,
        _path: &Path,
        _policy: HomePolicy,
    ) -> Result<()> {
        Err(UsermuxError::PolicyRejected(
            "Windows materializes profile directories at first logon; \
             create accounts with the skip home policy"
                .to_string(),
        ))
    }

    async fn remove_home(&mut self, _username: &str, _path: &Path) -> Result<()> {
        Err(UsermuxError::PolicyRejected(
            "profile removal is not supported by the Windows local accounts backend".to_string(),
        ))
    }
}
