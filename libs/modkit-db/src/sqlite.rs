//! SQLite DSN handling: pragma extraction, in-memory detection, parent directory creation.
//!
//! Pragmas may be passed as DSN query parameters
//! (`sqlite://voucher.db?journal_mode=wal&busy_timeout=3000`). Only a fixed whitelist is
//! recognized; anything else is left in the DSN for sqlx to interpret.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteJournalMode, SqliteSynchronous};

const PRAGMA_KEYS: &[&str] = &["journal_mode", "synchronous", "busy_timeout"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JournalMode {
    Delete,
    Wal,
    Memory,
    Truncate,
    Persist,
    Off,
}

impl JournalMode {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DELETE" => Some(Self::Delete),
            "WAL" => Some(Self::Wal),
            "MEMORY" => Some(Self::Memory),
            "TRUNCATE" => Some(Self::Truncate),
            "PERSIST" => Some(Self::Persist),
            "OFF" => Some(Self::Off),
            _ => None,
        }
    }

    pub(crate) fn to_sqlx(self) -> SqliteJournalMode {
        match self {
            Self::Delete => SqliteJournalMode::Delete,
            Self::Wal => SqliteJournalMode::Wal,
            Self::Memory => SqliteJournalMode::Memory,
            Self::Truncate => SqliteJournalMode::Truncate,
            Self::Persist => SqliteJournalMode::Persist,
            Self::Off => SqliteJournalMode::Off,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    Off,
    Normal,
    Full,
    Extra,
}

impl SyncMode {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OFF" => Some(Self::Off),
            "NORMAL" => Some(Self::Normal),
            "FULL" => Some(Self::Full),
            "EXTRA" => Some(Self::Extra),
            _ => None,
        }
    }

    pub(crate) fn to_sqlx(self) -> SqliteSynchronous {
        match self {
            Self::Off => SqliteSynchronous::Off,
            Self::Normal => SqliteSynchronous::Normal,
            Self::Full => SqliteSynchronous::Full,
            Self::Extra => SqliteSynchronous::Extra,
        }
    }
}

/// Pragmas recognized in a SQLite DSN.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pragmas {
    pub journal_mode: Option<JournalMode>,
    pub synchronous: Option<SyncMode>,
    pub busy_timeout: Option<Duration>,
}

impl Pragmas {
    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "journal_mode" => match JournalMode::parse(value) {
                Some(m) => self.journal_mode = Some(m),
                None => tracing::warn!(value, "Invalid 'journal_mode' pragma, ignoring"),
            },
            "synchronous" => match SyncMode::parse(value) {
                Some(m) => self.synchronous = Some(m),
                None => tracing::warn!(value, "Invalid 'synchronous' pragma, ignoring"),
            },
            "busy_timeout" => match value.parse::<u64>() {
                Ok(ms) => self.busy_timeout = Some(Duration::from_millis(ms)),
                Err(_) => tracing::warn!(value, "Invalid 'busy_timeout' pragma, ignoring"),
            },
            _ => {}
        }
    }
}

/// Split a DSN into the part sqlx understands and the pragmas we apply ourselves.
pub fn split_pragmas(dsn: &str) -> (String, Pragmas) {
    let mut pragmas = Pragmas::default();
    let Some((base, query)) = dsn.split_once('?') else {
        return (dsn.to_string(), pragmas);
    };

    let mut kept = Vec::new();
    for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
        let key = k.to_ascii_lowercase();
        if PRAGMA_KEYS.contains(&key.as_str()) {
            pragmas.apply(&key, &v);
        } else {
            kept.push(format!("{k}={v}"));
        }
    }

    let clean = if kept.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", kept.join("&"))
    };
    (clean, pragmas)
}

pub fn is_memory_dsn(dsn: &str) -> bool {
    dsn.contains(":memory:") || dsn.contains("mode=memory")
}

/// Create the parent directory of a file-backed SQLite DSN.
pub fn prepare_sqlite_path(dsn: &str) -> std::io::Result<()> {
    if is_memory_dsn(dsn) {
        return Ok(());
    }
    let raw = dsn
        .strip_prefix("sqlite://")
        .or_else(|| dsn.strip_prefix("sqlite:"))
        .unwrap_or(dsn);
    let path = raw.split_once('?').map_or(raw, |(p, _)| p);
    if path.starts_with("file:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pragmas_are_removed_from_dsn() {
        let (clean, p) =
            split_pragmas("sqlite://data/app.db?journal_mode=wal&busy_timeout=3000&cache=shared");
        assert_eq!(clean, "sqlite://data/app.db?cache=shared");
        assert_eq!(p.journal_mode, Some(JournalMode::Wal));
        assert_eq!(p.busy_timeout, Some(Duration::from_millis(3000)));
        assert_eq!(p.synchronous, None);
    }

    #[test]
    fn invalid_pragma_values_are_ignored() {
        let (clean, p) = split_pragmas("sqlite://app.db?synchronous=sometimes&busy_timeout=-5");
        assert_eq!(clean, "sqlite://app.db");
        assert_eq!(p, Pragmas::default());
    }

    #[test]
    fn keys_are_case_insensitive() {
        let (_, p) = split_pragmas("sqlite://app.db?SYNCHRONOUS=full");
        assert_eq!(p.synchronous, Some(SyncMode::Full));
    }

    #[test]
    fn dsn_without_query_is_untouched() {
        let (clean, p) = split_pragmas("sqlite::memory:");
        assert_eq!(clean, "sqlite::memory:");
        assert_eq!(p, Pragmas::default());
        assert!(is_memory_dsn(&clean));
    }

    #[test]
    fn parent_dir_is_created_for_file_dsn() {
        let tmp = tempfile::tempdir().unwrap();
        let db = tmp.path().join("nested/dir/app.db");
        let dsn = format!("sqlite://{}", db.to_string_lossy());
        prepare_sqlite_path(&dsn).unwrap();
        assert!(db.parent().unwrap().exists());
    }
}
