//! Merging the structured and diagnostic connection sources.
//!
//! The structured socket table has exact tuples but often no pid. The
//! diagnostic command has pids but is parsed text. Rules, in order:
//!
//! 1. A structured row with pid 0 takes the pid of the first diagnostic row
//!    on the same (port, protocol) that has one.
//! 2. Structured rows keep their own address and state.
//! 3. Diagnostic rows in LISTENING or ESTABLISHED state are appended as
//!    supplementary rows.
//! 4. Rows are deduplicated on (port, protocol, state); first one wins.
//! 5. If the structured source failed, every diagnostic row is used.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::domain::{ConnectionRecord, STATE_ESTABLISHED, STATE_LISTENING};
use crate::ports::SourceError;

/// Merge both sources into one canonical list.
pub fn reconcile(
    structured: Result<Vec<ConnectionRecord>, SourceError>,
    diagnostic: Vec<ConnectionRecord>,
) -> Vec<ConnectionRecord> {
    let merged = match structured {
        Ok(structured) => {
            let mut merged = fill_pids(structured, &diagnostic);
            merged.extend(diagnostic.into_iter().filter(is_supplementary));
            merged
        }
        Err(e) => {
            warn!(error = %e, "Structured source failed, falling back to diagnostic output");
            diagnostic
        }
    };

    let deduped = dedup(merged);
    debug!(count = deduped.len(), "Reconciled connections");
    deduped
}

/// Fill missing pids in structured rows from the diagnostic rows.
pub fn fill_pids(
    mut structured: Vec<ConnectionRecord>,
    diagnostic: &[ConnectionRecord],
) -> Vec<ConnectionRecord> {
    for record in structured.iter_mut().filter(|r| !r.has_pid()) {
        if let Some(source) = diagnostic.iter().find(|d| {
            d.has_pid() && d.local_port == record.local_port && d.protocol == record.protocol
        }) {
            record.pid = source.pid;
        }
    }
    structured
}

/// Keep the first row for each (port, protocol, state).
pub fn dedup(records: Vec<ConnectionRecord>) -> Vec<ConnectionRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            let (port, protocol, state) = r.dedup_key();
            seen.insert((port, protocol, state.to_string()))
        })
        .collect()
}

fn is_supplementary(record: &ConnectionRecord) -> bool {
    record.state == STATE_LISTENING || record.state == STATE_ESTABLISHED
}
