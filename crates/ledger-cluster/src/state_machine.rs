//! The per-cluster state machine (§4.2): balance plus the prepare-log
//! and commit-log, applied from committed Raft entries.

use ledger_core::{AccountTag, ClusterTag, Command, LogEntry, TransactionId, TwoPcRecord};
use ledger_raft::StateMachine;
use ledger_storage::{AccountStore, RecordLog};
use std::path::Path;
use std::sync::Mutex;
use tracing::error;

/// Owns the balance file and both 2PC record logs for one cluster node,
/// and applies committed Raft commands to them.
///
/// Each piece of on-disk state is guarded by its own `Mutex` rather than
/// one lock for the whole struct: `apply` (from the Raft applier) and
/// read RPCs (`GetBalance`, `GetLogs`) can proceed independently, and
/// every write remains fsynced before it becomes visible, per §5.
#[derive(Debug)]
pub struct ClusterStateMachine {
    cluster: ClusterTag,
    account: Mutex<AccountStore>,
    prepare_log: Mutex<RecordLog>,
    commit_log: Mutex<RecordLog>,
}

impl ClusterStateMachine {
    /// Open (creating if necessary) the persisted balance and 2PC logs
    /// for `node_id` under `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the three files cannot be opened; a
    /// fatal-only startup condition per §7.
    pub fn open(base_dir: &Path, node_id: &str, cluster: ClusterTag) -> ledger_core::LedgerResult<Self> {
        Ok(Self {
            cluster,
            account: Mutex::new(AccountStore::open(base_dir, node_id)?),
            prepare_log: Mutex::new(RecordLog::open_prepare_log(base_dir, node_id)?),
            commit_log: Mutex::new(RecordLog::open_commit_log(base_dir, node_id)?),
        })
    }

    /// The account this cluster owns in the wire protocol's
    /// `transactions` map (`AccountA` for cluster A, `AccountB` for B).
    #[must_use]
    pub fn account_tag(&self) -> AccountTag {
        match self.cluster {
            ClusterTag::A | ClusterTag::Coordinator => AccountTag::AccountA,
            ClusterTag::B => AccountTag::AccountB,
        }
    }

    /// Current balance.
    ///
    /// # Panics
    ///
    /// Panics if the account mutex is poisoned by a prior panic while
    /// held, which never happens in correct operation.
    #[must_use]
    pub fn balance(&self) -> i64 {
        #[allow(clippy::unwrap_used)]
        let mut account = self.account.lock().unwrap();
        account.read().unwrap_or(0)
    }

    /// Transaction id to assign the next prepare on this cluster:
    /// `last prepare id + 1`, or `1` if none have been recorded (§3).
    #[must_use]
    pub fn next_transaction_id(&self) -> TransactionId {
        #[allow(clippy::unwrap_used)]
        let prepare_log = self.prepare_log.lock().unwrap();
        prepare_log.last().map_or(1, |record| record.transaction_id + 1)
    }

    /// The most recently appended prepare record, if any. §4.3's
    /// `2pc_commit` handler matches the commit to this record rather
    /// than to an id carried on the wire, which is well-defined because
    /// the coordinator never runs two transactions concurrently (§5,
    /// §9 open question 3).
    #[must_use]
    pub fn last_prepare(&self) -> Option<TwoPcRecord> {
        #[allow(clippy::unwrap_used)]
        self.prepare_log.lock().unwrap().last().copied()
    }

    /// Whether a commit record already exists for `transaction_id`; used
    /// to make `2pc_commit` idempotent (§4.3, §8).
    #[must_use]
    pub fn has_commit(&self, transaction_id: TransactionId) -> bool {
        #[allow(clippy::unwrap_used)]
        self.commit_log.lock().unwrap().find(transaction_id).is_some()
    }

    /// Snapshot of the prepare-log, for `GetLogs` (§6).
    #[must_use]
    pub fn prepare_records(&self) -> Vec<TwoPcRecord> {
        #[allow(clippy::unwrap_used)]
        self.prepare_log.lock().unwrap().records().to_vec()
    }

    /// Snapshot of the commit-log, for `GetLogs` (§6).
    #[must_use]
    pub fn commit_records(&self) -> Vec<TwoPcRecord> {
        #[allow(clippy::unwrap_used)]
        self.commit_log.lock().unwrap().records().to_vec()
    }
}

impl StateMachine for ClusterStateMachine {
    /// Apply one committed Raft entry (§4.2). Invariant 2 of §3/§8
    /// depends on every `AppendCommit` being applied exactly once, in
    /// index order, which the Raft applier guarantees.
    fn apply(&self, entry: &LogEntry) {
        match &entry.command {
            Command::Noop => {}
            Command::SetBalance { value } => {
                #[allow(clippy::unwrap_used)]
                if let Err(err) = self.account.lock().unwrap().write(*value) {
                    error!(%err, "failed to persist SetBalance");
                }
            }
            Command::AppendPrepare { record } => {
                #[allow(clippy::unwrap_used)]
                if let Err(err) = self.prepare_log.lock().unwrap().append(*record) {
                    error!(%err, "failed to persist prepare record");
                }
            }
            Command::AppendCommit {
                record,
                delta_for_this_cluster,
            } => {
                #[allow(clippy::unwrap_used)]
                if let Err(err) = self.commit_log.lock().unwrap().append(*record) {
                    error!(%err, "failed to persist commit record");
                    return;
                }
                #[allow(clippy::unwrap_used)]
                let mut account = self.account.lock().unwrap();
                let balance = account.read().unwrap_or(0);
                if let Err(err) = account.write(balance + delta_for_this_cluster) {
                    error!(%err, "failed to persist balance after commit");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use ledger_core::{Command, TransactionDeltas};

    fn record(id: TransactionId) -> TwoPcRecord {
        TwoPcRecord {
            transaction_id: id,
            simulation_num: 0,
            transactions: TransactionDeltas {
                account_a: -100,
                account_b: 100,
            },
        }
    }

    #[test]
    fn applying_commit_adds_delta_to_balance() {
        let dir = tempfile::tempdir().unwrap();
        let machine = ClusterStateMachine::open(dir.path(), "A1", ClusterTag::A).unwrap();
        assert_eq!(machine.balance(), 0);

        machine.apply(&LogEntry {
            index: 1,
            term: 1,
            command: Command::AppendPrepare { record: record(1) },
        });
        machine.apply(&LogEntry {
            index: 2,
            term: 1,
            command: Command::AppendCommit {
                record: record(1),
                delta_for_this_cluster: -100,
            },
        });

        assert_eq!(machine.balance(), -100);
        assert!(machine.has_commit(1));
        assert_eq!(machine.prepare_records().len(), 1);
        assert_eq!(machine.commit_records().len(), 1);
    }

    #[test]
    fn next_transaction_id_increments_from_last_prepare() {
        let dir = tempfile::tempdir().unwrap();
        let machine = ClusterStateMachine::open(dir.path(), "A1", ClusterTag::A).unwrap();
        assert_eq!(machine.next_transaction_id(), 1);

        machine.apply(&LogEntry {
            index: 1,
            term: 1,
            command: Command::AppendPrepare { record: record(1) },
        });
        assert_eq!(machine.next_transaction_id(), 2);
    }

    #[test]
    fn account_tag_matches_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let a = ClusterStateMachine::open(dir.path(), "A1", ClusterTag::A).unwrap();
        assert_eq!(a.account_tag(), AccountTag::AccountA);
        let dir_b = tempfile::tempdir().unwrap();
        let b = ClusterStateMachine::open(dir_b.path(), "B1", ClusterTag::B).unwrap();
        assert_eq!(b.account_tag(), AccountTag::AccountB);
    }
}
