use std::fmt;
use std::str::FromStr;

use super::error::RowStoreError;

/// Largest rowid a table B-tree can hold
pub const MAX_ROWID: i64 = i64::MAX;

/// Number of random candidates probed once the largest rowid is taken
pub const NEW_ROWID_ATTEMPTS: usize = 100;

/// Name prefix of indexes created for UNIQUE / PRIMARY KEY constraints
pub const AUTOINDEX_PREFIX: &str = "sqlite_autoindex_";

/// How the page engine flushes data to stable storage.
///
/// The row-store layer never acts on this; it only carries the policy to the
/// engine through [`StoreOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SyncPolicy {
    /// Sync at critical moments only.
    Normal,
    /// Sync the journal and the database file on every commit.
    #[default]
    Full,
    /// Sync database content but not journal metadata.
    DataOnly,
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPolicy::Normal => write!(f, "NORMAL"),
            SyncPolicy::Full => write!(f, "FULL"),
            SyncPolicy::DataOnly => write!(f, "DATAONLY"),
        }
    }
}

impl FromStr for SyncPolicy {
    type Err = RowStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NORMAL" => Ok(SyncPolicy::Normal),
            "FULL" => Ok(SyncPolicy::Full),
            "DATAONLY" => Ok(SyncPolicy::DataOnly),
            other => Err(RowStoreError::InvalidArgument(format!(
                "unknown sync policy: {}",
                other
            ))),
        }
    }
}

/// Text encoding of the database file; TEXT values in records use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    /// Decodes the text-encoding field of a database header (1, 2 or 3).
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(TextEncoding::Utf8),
            2 => Some(TextEncoding::Utf16Le),
            3 => Some(TextEncoding::Utf16Be),
            _ => None,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            TextEncoding::Utf8 => 1,
            TextEncoding::Utf16Le => 2,
            TextEncoding::Utf16Be => 3,
        }
    }
}

/// Options shared by an engine and every table opened on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreOptions {
    pub encoding: TextEncoding,
    pub sync: SyncPolicy,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn sync(mut self, sync: SyncPolicy) -> Self {
        self.sync = sync;
        self
    }
}
