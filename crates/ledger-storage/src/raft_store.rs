//! Raft persistent state: `<NodeId>_raft_state.json` (current term and
//! vote) plus an append-only `<NodeId>_raft_log` (the log prefix).
//!
//! Per §4.1, `currentTerm`, `votedFor`, and the log prefix through the
//! last index must survive a restart; the commit index and other
//! volatile state may be rebuilt by replaying committed entries.

use ledger_core::{LedgerResult, LogEntry, NodeId, RaftTerm};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// The small, frequently-overwritten half of persistent Raft state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedTermAndVote {
    current_term: RaftTerm,
    voted_for: Option<NodeId>,
}

/// Durable store for `currentTerm`, `votedFor`, and the log prefix.
#[derive(Debug)]
pub struct RaftStore {
    state_path: PathBuf,
    state_file: File,
    log_path: PathBuf,
    log_file: File,
    term_and_vote: PersistedTermAndVote,
    log: Vec<LogEntry>,
}

impl RaftStore {
    /// Open (creating if necessary) the state and log files for
    /// `node_id` under `base_dir`, replaying any log entries already on
    /// disk.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be opened, or if the
    /// persisted state or an existing log line fails to parse.
    pub fn open(base_dir: &Path, node_id: &str) -> LedgerResult<Self> {
        let state_path = base_dir.join(format!("{node_id}_raft_state.json"));
        let mut state_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&state_path)?;

        let mut contents = String::new();
        state_file.read_to_string(&mut contents)?;
        let term_and_vote = if contents.trim().is_empty() {
            let default = PersistedTermAndVote::default();
            Self::write_term_and_vote(&mut state_file, &default)?;
            default
        } else {
            serde_json::from_str(&contents)?
        };

        let log_path = base_dir.join(format!("{node_id}_raft_log"));
        let log_read = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&log_path)?;

        let mut log = Vec::new();
        for line in BufReader::new(&log_read).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            log.push(serde_json::from_str(&line)?);
        }

        let log_file = OpenOptions::new().append(true).open(&log_path)?;

        Ok(Self {
            state_path,
            state_file,
            log_path,
            log_file,
            term_and_vote,
            log,
        })
    }

    fn write_term_and_vote(file: &mut File, value: &PersistedTermAndVote) -> LedgerResult<()> {
        let json = serde_json::to_string(value)?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Currently persisted term.
    #[must_use]
    pub fn current_term(&self) -> RaftTerm {
        self.term_and_vote.current_term
    }

    /// Currently persisted vote for the current term, if any.
    #[must_use]
    pub fn voted_for(&self) -> Option<&NodeId> {
        self.term_and_vote.voted_for.as_ref()
    }

    /// Persist a new term and vote together (the common case: stepping
    /// into a new term always clears the old vote).
    ///
    /// # Errors
    ///
    /// Returns an error if the write or fsync fails.
    pub fn persist_term_and_vote(
        &mut self,
        term: RaftTerm,
        voted_for: Option<NodeId>,
    ) -> LedgerResult<()> {
        self.term_and_vote = PersistedTermAndVote {
            current_term: term,
            voted_for,
        };
        Self::write_term_and_vote(&mut self.state_file, &self.term_and_vote)
    }

    /// All log entries currently known, in index order starting at 1.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.log
    }

    /// The last entry's index and term, or `(0, 0)` for an empty log.
    #[must_use]
    pub fn last_index_and_term(&self) -> (ledger_core::LogIndex, RaftTerm) {
        self.log
            .last()
            .map_or((0, 0), |entry| (entry.index, entry.term))
    }

    /// The entry at `index` (1-based), if present.
    #[must_use]
    pub fn entry_at(&self, index: ledger_core::LogIndex) -> Option<&LogEntry> {
        if index == 0 {
            return None;
        }
        self.log.get(usize::try_from(index - 1).ok()?)
    }

    /// Append one entry, fsyncing before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write/fsync fails.
    pub fn append_entry(&mut self, entry: LogEntry) -> LedgerResult<()> {
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        self.log_file.write_all(line.as_bytes())?;
        self.log_file.sync_all()?;
        self.log.push(entry);
        Ok(())
    }

    /// Truncate the in-memory and on-disk log to drop every entry from
    /// `from_index` (1-based, inclusive) onward, then rewrite the file.
    /// Used when `AppendEntries` finds a conflicting suffix.
    ///
    /// # Errors
    ///
    /// Returns an error if rewriting the log file fails.
    pub fn truncate_from(&mut self, from_index: ledger_core::LogIndex) -> LedgerResult<()> {
        if from_index == 0 {
            self.log.clear();
        } else {
            let keep = usize::try_from(from_index - 1).unwrap_or(0);
            self.log.truncate(keep);
        }
        self.rewrite_log_file()
    }

    fn rewrite_log_file(&mut self) -> LedgerResult<()> {
        let mut contents = String::new();
        for entry in &self.log {
            contents.push_str(&serde_json::to_string(entry)?);
            contents.push('\n');
        }
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.log_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        self.log_file = OpenOptions::new().append(true).open(&self.log_path)?;
        Ok(())
    }

    /// Path of the state file, for diagnostics.
    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }
}
