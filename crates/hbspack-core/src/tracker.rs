//! Records which helpers and partials a single compilation references.

use hbspack_compiler::{LookupKind, NameLookupHook};
use indexmap::IndexSet;
use std::path::{Path, PathBuf};

/// Names observed during one compilation, in first-discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceRecord {
    pub helpers: IndexSet<String>,
    pub partials: IndexSet<String>,
}

/// Entry point for tracking; holds no state of its own.
///
/// Each compilation gets a fresh [`TrackingHandle`] that is lent to the
/// compiler for the duration of that call only, so concurrent
/// compilations, including two of the same file, never share a record.
pub struct ReferenceTracker;

impl ReferenceTracker {
    pub fn begin(invocation_key: impl Into<PathBuf>) -> TrackingHandle {
        TrackingHandle {
            key: invocation_key.into(),
            record: ReferenceRecord::default(),
        }
    }
}

#[derive(Debug)]
pub struct TrackingHandle {
    key: PathBuf,
    record: ReferenceRecord,
}

impl TrackingHandle {
    /// The file this handle tracks.
    pub fn key(&self) -> &Path {
        &self.key
    }

    pub fn finish(self) -> ReferenceRecord {
        self.record
    }
}

impl NameLookupHook for TrackingHandle {
    fn name_lookup(&mut self, name: &str, kind: LookupKind) {
        match kind {
            LookupKind::Helper => {
                self.record.helpers.insert(name.to_string());
            }
            LookupKind::Partial => {
                self.record.partials.insert(name.to_string());
            }
            LookupKind::Context | LookupKind::Data => {}
        }
    }
}
