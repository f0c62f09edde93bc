//! Resolution of the server home directory.
//!
//! Rules:
//! - explicit value: `~` / `~/...` expand against the user's home, relative paths are
//!   made absolute against the current directory
//! - no value: `<user home>/<default_subdir>`
//!
//! The user's home comes from `HOME`, or `USERPROFILE` / `APPDATA` on Windows.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HomeDirError {
    #[error("cannot determine the user's home directory (HOME is not set)")]
    NoUserHome,

    #[error("failed to create home directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
}

fn user_home() -> Option<PathBuf> {
    let keys: &[&str] = if cfg!(windows) {
        &["USERPROFILE", "APPDATA", "HOME"]
    } else {
        &["HOME"]
    };
    keys.iter()
        .filter_map(|k| std::env::var_os(k))
        .find(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Resolve (and optionally create) the home directory. The result is always absolute.
pub fn resolve_home_dir(
    configured: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf, HomeDirError> {
    resolve_with(configured, default_subdir, create, user_home())
}

fn resolve_with(
    configured: Option<String>,
    default_subdir: &str,
    create: bool,
    user_home: Option<PathBuf>,
) -> Result<PathBuf, HomeDirError> {
    let path = match configured.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => user_home.ok_or(HomeDirError::NoUserHome)?.join(default_subdir),
        Some("~") => user_home.ok_or(HomeDirError::NoUserHome)?,
        Some(s) => match s.strip_prefix("~/").or_else(|| s.strip_prefix("~\\")) {
            Some(rest) => user_home.ok_or(HomeDirError::NoUserHome)?.join(rest),
            None => absolutize(Path::new(s))?,
        },
    };

    if create {
        std::fs::create_dir_all(&path).map_err(|source| HomeDirError::Create {
            path: path.clone(),
            source,
        })?;
    }

    Ok(path)
}

fn absolutize(p: &Path) -> Result<PathBuf, HomeDirError> {
    if p.is_absolute() {
        return Ok(p.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(HomeDirError::CurrentDir)?;
    Ok(cwd.join(p))
}
