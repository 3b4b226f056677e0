//! Session cookie snapshot persisted between runs.
//!
//! The file is a JSON array of `{name, value, domain, path}` objects and is
//! always replaced whole: written to a sibling temp file created owner-only,
//! then renamed over the target.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BotResult;

/// One browser cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    "/".to_string()
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_path(),
        }
    }
}

/// Read the cookie snapshot.
///
/// Returns `Ok(None)` when the file is missing, unparsable or empty; any of
/// those means "log in again". Other IO failures are errors.
pub fn load_cookies(path: &Path) -> BotResult<Option<Vec<Cookie>>> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice::<Vec<Cookie>>(&raw) {
        Ok(cookies) if cookies.is_empty() => Ok(None),
        Ok(cookies) => Ok(Some(cookies)),
        Err(e) => {
            tracing::warn!(path = %path.display(), "ignoring unreadable cookie file: {e}");
            Ok(None)
        }
    }
}

/// Atomically replace the cookie snapshot.
pub fn save_cookies(path: &Path, cookies: &[Cookie]) -> BotResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    let json = serde_json::to_vec_pretty(cookies)?;
    write_private(&tmp, &json)?;
    std::fs::rename(&tmp, path)?;

    tracing::debug!(path = %path.display(), count = cookies.len(), "cookies saved");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = format!(
        ".{}.tmp",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("cookies.json")
    );
    path.with_file_name(name)
}

/// Write `bytes` to a freshly created file that only the owner can read.
///
/// A leftover file at `path` is removed first; the mode only applies on
/// creation.
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
