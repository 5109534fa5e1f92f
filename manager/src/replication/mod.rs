//! Local replication between two dataset hierarchies.
//!
//! Nothing about a replication is stored by this tool. The state of a pair is
//! recomputed on every run from the markers present on both sides, so markers
//! deleted by hand on either side are simply reconciled on the next run.

pub mod engine;
pub mod resolver;

use serde::Serialize;

use crate::config::ReplicationRoot;
use crate::errors::ZsnapError;
use crate::inventory::{join_path, pool_of, relative_to, Snapshot};

pub use engine::{ReplicationEngine, ReplicationReport};
pub use resolver::ReplicationResolver;

/// A validated source/destination association.
///
/// Constructing one checks that the destination mirrors the source, either under
/// the configured roots or, without one, by the source's path below its pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationPair {
    pub source: String,
    pub destination: String,
}

impl ReplicationPair {
    pub fn new(
        source: &str,
        destination: &str,
        roots: &[ReplicationRoot],
    ) -> Result<Self, ZsnapError> {
        let source = source.trim_end_matches('/');
        let destination = destination.trim_end_matches('/');

        if source.is_empty() || destination.is_empty() {
            return Err(ZsnapError::Config(
                "source and destination must both be named".to_string(),
            ));
        }

        if relative_to(destination, source).is_some() || relative_to(source, destination).is_some() {
            return Err(ZsnapError::StructureMismatch {
                source_path: source.to_string(),
                destination: destination.to_string(),
                expected: "a dataset outside the source hierarchy".to_string(),
            });
        }

        // The most specific configured root covering the source decides the layout
        let mapping = roots
            .iter()
            .filter_map(|root| relative_to(source, &root.source).map(|suffix| (root, suffix)))
            .max_by_key(|(root, _)| root.source.len());

        let mismatch = |expected: String| ZsnapError::StructureMismatch {
            source_path: source.to_string(),
            destination: destination.to_string(),
            expected,
        };

        match mapping {
            Some((root, suffix)) => {
                let expected = join_path(&root.destination, suffix);
                if expected != destination {
                    return Err(mismatch(expected));
                }
            }
            // No root configured: the path below the source pool must reappear
            // at the end of the destination
            None => {
                let suffix = relative_to(source, pool_of(source)).unwrap_or_default();
                if !suffix.is_empty() && !ends_with_path(destination, suffix) {
                    return Err(mismatch(format!("a dataset ending in /{}", suffix)));
                }
            }
        }

        Ok(Self {
            source: source.to_string(),
            destination: destination.to_string(),
        })
    }
}

/// Whether the last components of `path` are exactly `suffix`.
fn ends_with_path(path: &str, suffix: &str) -> bool {
    path == suffix
        || path
            .strip_suffix(suffix)
            .is_some_and(|head| head.ends_with('/'))
}

/// Replication state of a pair, derived fresh on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "marker", rename_all = "snake_case")]
pub enum ReplicationState {
    /// Destination does not exist yet
    Uninitialized,
    /// Latest marker present on both sides (the source-side snapshot)
    SyncedAt(Snapshot),
    /// Destination exists but shares no marker with the source
    Diverged,
}
