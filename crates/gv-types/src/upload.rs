use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::ContentAddress;

/// One committed snapshot as reported by the remote store's listing.
///
/// Never cached locally: the remote store is the only source of truth for
/// which snapshots exist and in what order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadRecord {
    pub content_address: ContentAddress,
    pub created_at: DateTime<Utc>,
}

impl UploadRecord {
    pub fn new(content_address: ContentAddress, created_at: DateTime<Utc>) -> Self {
        Self {
            content_address,
            created_at,
        }
    }

    /// Newest-first ordering.
    ///
    /// Later `created_at` sorts first. Equal timestamps fall back to the
    /// content address, larger first, so the order is total and stable
    /// across listings.
    pub fn recency_cmp(&self, other: &Self) -> Ordering {
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| other.content_address.cmp(&self.content_address))
    }

    /// Sort a listing newest-first in place.
    pub fn sort_newest_first(records: &mut [UploadRecord]) {
        records.sort_by(Self::recency_cmp);
    }
}

impl fmt::Display for UploadRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}",
            self.content_address.short_hex(),
            self.created_at.to_rfc3339()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64, fill: u8) -> UploadRecord {
        UploadRecord::new(
            ContentAddress::from_hash([fill; 32]),
            Utc.timestamp_opt(secs, 0).unwrap(),
        )
    }

    #[test]
    fn newer_sorts_first() {
        let mut records = vec![at(10, 1), at(30, 2), at(20, 3)];
        UploadRecord::sort_newest_first(&mut records);
        let secs: Vec<i64> = records.iter().map(|r| r.created_at.timestamp()).collect();
        assert_eq!(secs, vec![30, 20, 10]);
    }

    #[test]
    fn equal_timestamps_break_on_address() {
        let mut records = vec![at(10, 1), at(10, 9), at(10, 5)];
        UploadRecord::sort_newest_first(&mut records);
        let fills: Vec<u8> = records.iter().map(|r| r.content_address.as_bytes()[0]).collect();
        assert_eq!(fills, vec![9, 5, 1]);
    }

    #[test]
    fn serde_roundtrip() {
        let record = at(1_700_000_000, 7);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("content_address"));
        let parsed: UploadRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
