//! Snapshot naming and retention policy.
//!
//! Every function takes `now` explicitly; nothing in here reads the clock.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;

use crate::constants::labels::{AUTOMATIC_PREFIX, MARKER_PREFIX, TIMESTAMP_FORMAT};

/// What a snapshot label says about its origin.
///
/// `taken_at` is `None` when the label has a known prefix but a malformed timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapshotKind {
    Automatic { taken_at: Option<DateTime<Utc>> },
    Marker { taken_at: Option<DateTime<Utc>> },
    /// Created by someone else; never touched by this tool
    External,
}

impl SnapshotKind {
    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        match self {
            SnapshotKind::Automatic { taken_at } | SnapshotKind::Marker { taken_at } => *taken_at,
            SnapshotKind::External => None,
        }
    }
}

pub fn automatic_label(now: DateTime<Utc>) -> String {
    format!("{}{}", AUTOMATIC_PREFIX, now.format(TIMESTAMP_FORMAT))
}

pub fn marker_label(now: DateTime<Utc>) -> String {
    format!("{}{}", MARKER_PREFIX, now.format(TIMESTAMP_FORMAT))
}

pub fn is_automatic(label: &str) -> bool {
    label.starts_with(AUTOMATIC_PREFIX)
}

pub fn is_marker(label: &str) -> bool {
    label.starts_with(MARKER_PREFIX)
}

/// Classifies a label and parses its embedded timestamp once.
pub fn classify(label: &str) -> SnapshotKind {
    if let Some(stamp) = label.strip_prefix(AUTOMATIC_PREFIX) {
        SnapshotKind::Automatic {
            taken_at: parse_timestamp(stamp),
        }
    } else if let Some(stamp) = label.strip_prefix(MARKER_PREFIX) {
        SnapshotKind::Marker {
            taken_at: parse_timestamp(stamp),
        }
    } else {
        SnapshotKind::External
    }
}

/// Whether a snapshot with this label is past its retention.
///
/// Unparseable timestamps count as expired.
pub fn is_expired(label: &str, retention_hours: u32, now: DateTime<Utc>) -> bool {
    expired_at(classify(label).taken_at(), retention_hours, now)
}

/// Retention predicate over an already parsed timestamp: `now - taken_at > retention`.
pub fn expired_at(taken_at: Option<DateTime<Utc>>, retention_hours: u32, now: DateTime<Utc>) -> bool {
    match taken_at {
        Some(taken_at) => now.signed_duration_since(taken_at) > Duration::hours(i64::from(retention_hours)),
        None => true,
    }
}

fn parse_timestamp(stamp: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
