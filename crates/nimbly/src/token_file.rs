//! Token file persistence.
//!
//! The token file keeps authentication alive across restarts. Its JSON
//! shape matches what the original exporter wrote, so existing
//! deployments can keep their file.

use std::io::ErrorKind;
use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use nimbly_api::{PersistedToken, Token};

/// Load and sanity-check a token from disk.
///
/// Returns `Ok(None)` when the file does not exist or the restored token
/// is unusable (expired without recovery); degraded-but-usable tokens are
/// returned with a warning.
pub fn load_token(path: &Path) -> std::io::Result<Option<Token>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    let persisted: PersistedToken = serde_json::from_slice(&data)
        .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
    let mut token = Token::from(persisted);

    let now = Utc::now();
    if token.expires_at.is_some_and(|e| e < now) && token.refresh_token.is_none() {
        warn!("Restored token has expired and has no refresh token! Token has been ignored.");
        return Ok(None);
    }
    if token.refresh_token.is_none() {
        warn!("Restored token has no refresh token! Exporter will need to be re-authenticated manually.");
    }
    if token.access_token.is_some() && token.expires_at.is_none() {
        warn!("Restored token has no expiry time! Token will be renewed immediately.");
        token.expires_at = Some(now);
    }

    info!("Loaded token from {}.", path.display());
    Ok(Some(token))
}

/// Write the token to disk, owner-readable only.
pub fn save_token(path: &Path, token: &Token) -> std::io::Result<()> {
    let persisted = PersistedToken::from(token);
    let data = serde_json::to_vec(&persisted)
        .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;

    std::fs::write(path, data)?;

    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, Permissions::from_mode(0o600))?;
    }

    Ok(())
}

/// Remove the token file; missing is not an error.
pub fn delete_token(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
