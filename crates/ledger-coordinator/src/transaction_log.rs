//! The coordinator's own append-only transaction log,
//! `coordinator_transactions.log` (SPEC_FULL.md §B.5).
//!
//! Not one of §6's per-node persisted files — it belongs to the
//! coordinator process, not a cluster node — but built the same way as
//! [`ledger_storage::record_log::RecordLog`]: one JSON object per line,
//! fsynced on append. It is the coordinator's half of the recovery
//! comparison in §4.4 and §9 open question 3: after a simulated crash,
//! the coordinator consults its own last entry (not the participants'
//! logs) to know which phase it had reached.

use ledger_core::{LedgerResult, TransactionDeltas};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Where a transaction's drive currently stands, as recorded by the
/// coordinator for its own recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionPhase {
    /// Both participants replied `prepared`.
    Prepared,
    /// `2pc_commit` was sent to at least one participant.
    CommitSent,
    /// The transaction reached the terminal client-visible `committed`
    /// outcome.
    Committed,
    /// The transaction reached the terminal client-visible `aborted`
    /// outcome.
    Aborted,
}

/// One line of the coordinator's transaction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLogEntry {
    /// The transaction's account deltas.
    pub transactions: TransactionDeltas,
    /// Fault-injection tag carried through for observability.
    pub simulation_num: u32,
    /// Phase reached when this entry was appended.
    pub phase: TransactionPhase,
    /// Wall-clock time this entry was appended, stamped by
    /// [`TransactionLog::append`] rather than supplied by the caller.
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// The fields a caller supplies for one transaction log entry; the
/// timestamp is filled in by [`TransactionLog::append`].
#[derive(Debug, Clone)]
pub struct PendingEntry {
    /// The transaction's account deltas.
    pub transactions: TransactionDeltas,
    /// Fault-injection tag carried through for observability.
    pub simulation_num: u32,
    /// Phase reached when this entry is appended.
    pub phase: TransactionPhase,
}

/// Append-only log of [`TransactionLogEntry`] values.
#[derive(Debug)]
pub struct TransactionLog {
    path: PathBuf,
    file: File,
    entries: Vec<TransactionLogEntry>,
}

impl TransactionLog {
    /// Open (creating if necessary) `coordinator_transactions.log` under
    /// `base_dir`, loading any entries already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, or an existing
    /// line fails to parse.
    pub fn open(base_dir: &Path) -> LedgerResult<Self> {
        let path = base_dir.join("coordinator_transactions.log");

        let read_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        let mut entries = Vec::new();
        for line in BufReader::new(&read_file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }

        let file = OpenOptions::new().append(true).open(&path)?;

        Ok(Self {
            path,
            file,
            entries,
        })
    }

    /// Stamp `entry` with the current time, append it, and fsync before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write/fsync fails.
    pub fn append(&mut self, entry: PendingEntry) -> LedgerResult<()> {
        let entry = TransactionLogEntry {
            transactions: entry.transactions,
            simulation_num: entry.simulation_num,
            phase: entry.phase,
            recorded_at: chrono::Utc::now(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.sync_all()?;
        self.entries.push(entry);
        Ok(())
    }

    /// The most recently appended entry, if any. Per §9 open question 3,
    /// comparing only the last entry is well-defined because the
    /// coordinator never drives two transactions concurrently (§5).
    #[must_use]
    pub fn last(&self) -> Option<&TransactionLogEntry> {
        self.entries.last()
    }

    /// Path on disk, for diagnostics.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use ledger_core::TransactionDeltas;

    fn entry(phase: TransactionPhase) -> PendingEntry {
        PendingEntry {
            transactions: TransactionDeltas {
                account_a: -100,
                account_b: 100,
            },
            simulation_num: 0,
            phase,
        }
    }

    #[test]
    fn append_then_last_returns_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TransactionLog::open(dir.path()).unwrap();
        log.append(entry(TransactionPhase::Prepared)).unwrap();
        log.append(entry(TransactionPhase::Committed)).unwrap();

        assert_eq!(log.last().unwrap().phase, TransactionPhase::Committed);
    }

    #[test]
    fn reopen_replays_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = TransactionLog::open(dir.path()).unwrap();
            log.append(entry(TransactionPhase::Aborted)).unwrap();
        }
        let reopened = TransactionLog::open(dir.path()).unwrap();
        assert_eq!(reopened.last().unwrap().phase, TransactionPhase::Aborted);
    }
}
