use std::cmp::Ordering;

use crate::common::TextEncoding;
use crate::tuple::{compare_keys, decode_record};

pub trait KeyComparator: Send + Sync {
    /// Compares two encoded keys. Fields past the end of the shorter key are
    /// ignored, so a probe holding only the indexed values matches every
    /// entry that starts with them.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Orders index keys stored as records, field by field.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordComparator {
    encoding: TextEncoding,
}

impl RecordComparator {
    pub fn new(encoding: TextEncoding) -> Self {
        Self { encoding }
    }
}

impl KeyComparator for RecordComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match (
            decode_record(a, self.encoding),
            decode_record(b, self.encoding),
        ) {
            (Ok(a), Ok(b)) => compare_keys(&a, &b),
            // undecodable keys still need a stable position
            _ => a.cmp(b),
        }
    }
}
