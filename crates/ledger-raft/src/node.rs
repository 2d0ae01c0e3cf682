//! The Raft consensus engine for a single node in a three-node cluster
//! (§4.1). A [`RaftNode`] owns the node's persistent log/term/vote store,
//! drives leader election and replication, and hands committed entries
//! to a [`StateMachine`]. It knows nothing about 2PC; the participant
//! layer (`ledger-cluster`) composes a `RaftNode` rather than inheriting
//! from it, per the re-architecture guidance in §9.

use crate::apply::StateMachine;
use crate::error::{RaftError, RaftResult};
use crate::state::{RaftRole, RaftTiming, SIMULATE_CRASH_DURATION};
use ledger_core::{Command, LedgerError, LogEntry, LogIndex, NodeId, NodeTable, RaftTerm};
use ledger_storage::RaftStore;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};

/// Mutable Raft state guarded by the single coarse-grained mutex
/// described in §5. Everything that must be consistent across an
/// election, an append, and an apply lives here; network I/O happens
/// with the lock released.
struct Inner {
    store: RaftStore,
    role: RaftRole,
    commit_index: LogIndex,
    last_applied: LogIndex,
    current_leader: Option<NodeId>,
    votes_received: HashSet<NodeId>,
    next_index: HashMap<NodeId, LogIndex>,
    match_index: HashMap<NodeId, LogIndex>,
    election_deadline: Instant,
}

/// A single node's Raft consensus engine.
///
/// Construct with [`RaftNode::new`], then spawn its background tasks
/// with [`RaftNode::spawn_background_tasks`] once, from the owning
/// process's server bootstrap.
pub struct RaftNode {
    node_id: NodeId,
    peers: Vec<NodeId>,
    table: NodeTable,
    timing: RaftTiming,
    state_machine: Arc<dyn StateMachine>,
    inner: Mutex<Inner>,
    commit_notify: Notify,
    crashed_until: std::sync::Mutex<Option<Instant>>,
}

impl std::fmt::Debug for RaftNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaftNode")
            .field("node_id", &self.node_id)
            .field("peers", &self.peers)
            .finish_non_exhaustive()
    }
}

impl RaftNode {
    /// Build a new Raft node for `node_id`, replicating within `peers`
    /// (the other members of its cluster), persisting through `store`,
    /// and delivering committed entries to `state_machine`.
    #[must_use]
    pub fn new(
        node_id: NodeId,
        peers: Vec<NodeId>,
        table: NodeTable,
        store: RaftStore,
        timing: RaftTiming,
        state_machine: Arc<dyn StateMachine>,
    ) -> Arc<Self> {
        let inner = Inner {
            store,
            role: RaftRole::Follower,
            commit_index: 0,
            last_applied: 0,
            current_leader: None,
            votes_received: HashSet::new(),
            next_index: HashMap::new(),
            match_index: HashMap::new(),
            election_deadline: Instant::now() + random_election_timeout(&timing),
        };

        Arc::new(Self {
            node_id,
            peers,
            table,
            timing,
            state_machine,
            inner: Mutex::new(inner),
            commit_notify: Notify::new(),
            crashed_until: std::sync::Mutex::new(None),
        })
    }

    /// This node's id.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Spawn the election timer and heartbeat sender background tasks
    /// described in §5. Safe to call once per node; returns immediately.
    pub fn spawn_background_tasks(self: &Arc<Self>) {
        let election = Arc::clone(self);
        tokio::spawn(async move { election.run_election_timer().await });

        let heartbeat = Arc::clone(self);
        tokio::spawn(async move { heartbeat.run_heartbeat_sender().await });
    }

    /// Whether this node is currently simulating a network-detached
    /// crash (§4.1's `SimulateCrash`).
    #[must_use]
    pub fn is_crashed(&self) -> bool {
        #[allow(clippy::unwrap_used)]
        let guard = self.crashed_until.lock().unwrap();
        guard.is_some_and(|until| Instant::now() < until)
    }

    /// Detach this node from the network for [`SIMULATE_CRASH_DURATION`]
    /// (§4.1). All persistent state is retained; the node resumes
    /// participating automatically once the duration elapses and
    /// catches up via `AppendEntries` like any other partitioned
    /// follower.
    pub fn simulate_crash(&self) {
        let until = Instant::now() + SIMULATE_CRASH_DURATION;
        #[allow(clippy::unwrap_used)]
        {
            *self.crashed_until.lock().unwrap() = Some(until);
        }
        warn!(node_id = %self.node_id, duration = ?SIMULATE_CRASH_DURATION, "simulating crash");
    }

    /// Current Raft role.
    pub async fn role(&self) -> RaftRole {
        self.inner.lock().await.role
    }

    /// Whether this node currently believes itself to be leader.
    pub async fn is_leader(&self) -> bool {
        self.inner.lock().await.role == RaftRole::Leader
    }

    /// The node this node currently believes is leader, if any.
    pub async fn current_leader_hint(&self) -> Option<NodeId> {
        self.inner.lock().await.current_leader.clone()
    }

    /// The persisted current term.
    pub async fn current_term(&self) -> RaftTerm {
        self.inner.lock().await.store.current_term()
    }

    /// Ask a node whether it currently believes itself to be leader
    /// (§6's `GetLeaderStatus`). Stale-read windows are permitted by
    /// §4.2.
    pub async fn get_leader_status(&self) -> bool {
        self.is_leader().await
    }

    /// Every log entry currently known to this node, in index order.
    /// Backs the `raft_log` field of §6's `GetLogs` response.
    pub async fn log_entries(&self) -> Vec<LogEntry> {
        self.inner.lock().await.store.entries().to_vec()
    }

    /// Step down to follower if leader, resetting the election timer.
    /// No effect otherwise. Implements §4.1's `TriggerLeaderChange`.
    ///
    /// Returns whether this call actually stepped a leader down.
    pub async fn trigger_leader_change(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.role == RaftRole::Leader {
            info!(node_id = %self.node_id, "leader stepping down by operator request");
            inner.role = RaftRole::Follower;
            inner.election_deadline = Instant::now() + random_election_timeout(&self.timing);
            true
        } else {
            false
        }
    }

    /// Propose a command to be replicated (§4.2, §4.3). Returns the log
    /// index the entry was appended at if this node is leader.
    ///
    /// # Errors
    ///
    /// Returns [`RaftError::NotLeader`] if this node is not currently
    /// leader, or [`RaftError::Crashed`] if it is detached.
    pub async fn propose(&self, command: Command) -> RaftResult<LogIndex> {
        if self.is_crashed() {
            return Err(RaftError::Crashed);
        }
        let mut inner = self.inner.lock().await;
        if inner.role != RaftRole::Leader {
            return Err(RaftError::NotLeader);
        }
        let term = inner.store.current_term();
        let (last_index, _) = inner.store.last_index_and_term();
        let index = last_index + 1;
        inner
            .store
            .append_entry(LogEntry {
                index,
                term,
                command,
            })
            .map_err(LedgerError::from)?;
        let match_index = inner.match_index.entry(self.node_id.clone()).or_insert(0);
        *match_index = index;
        drop(inner);
        Ok(index)
    }

    /// Wait until `index` is committed (and thus applied), retrying
    /// replication to followers while waiting, up to `timeout`. Used by
    /// the 2PC participant to implement "wait for majority replication"
    /// (§4.3); a timeout here must be treated as a replication failure,
    /// not as success.
    ///
    /// # Errors
    ///
    /// Returns [`RaftError::ReplicationTimeout`] if `index` has not
    /// committed by the deadline, or [`RaftError::NotLeader`] if this
    /// node stepped down from leader while waiting.
    pub async fn wait_for_commit(&self, index: LogIndex, timeout: Duration) -> RaftResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_crashed() {
                return Err(RaftError::Crashed);
            }
            {
                let inner = self.inner.lock().await;
                if inner.role != RaftRole::Leader {
                    return Err(RaftError::NotLeader);
                }
                if inner.commit_index >= index {
                    return Ok(());
                }
            }
            self.replicate_once().await;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(RaftError::ReplicationTimeout);
            }
            let wait = remaining.min(Duration::from_millis(50));
            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                () = self.commit_notify.notified() => {}
            }
        }
    }

    /// Handle an inbound `RequestVote` RPC (§4.1).
    pub async fn handle_request_vote(
        &self,
        term: RaftTerm,
        candidate_id: NodeId,
        last_log_index: LogIndex,
        last_log_term: RaftTerm,
    ) -> RaftResult<(RaftTerm, bool)> {
        if self.is_crashed() {
            return Err(RaftError::Crashed);
        }
        let mut inner = self.inner.lock().await;
        self.step_down_if_stale(&mut inner, term).await;

        let current_term = inner.store.current_term();
        if term < current_term {
            return Ok((current_term, false));
        }

        let already_voted_other = inner
            .store
            .voted_for()
            .is_some_and(|voted| voted != &candidate_id);
        let (our_last_index, our_last_term) = inner.store.last_index_and_term();
        let candidate_up_to_date = (last_log_term, last_log_index) >= (our_last_term, our_last_index);

        if already_voted_other || !candidate_up_to_date {
            return Ok((current_term, false));
        }

        inner
            .store
            .persist_term_and_vote(term, Some(candidate_id.clone()))
            .map_err(LedgerError::from)?;
        inner.election_deadline = Instant::now() + random_election_timeout(&self.timing);
        info!(node_id = %self.node_id, %candidate_id, term, "granted vote");
        Ok((term, true))
    }

    /// Handle an inbound `AppendEntries` RPC (§4.1): replication or, if
    /// `entries` is empty, a heartbeat.
    pub async fn handle_append_entries(
        &self,
        term: RaftTerm,
        leader_id: NodeId,
        prev_log_index: LogIndex,
        prev_log_term: RaftTerm,
        entries: Vec<LogEntry>,
        leader_commit: LogIndex,
    ) -> RaftResult<(RaftTerm, bool, Option<LogIndex>)> {
        if self.is_crashed() {
            return Err(RaftError::Crashed);
        }
        let mut inner = self.inner.lock().await;
        self.step_down_if_stale(&mut inner, term).await;

        let current_term = inner.store.current_term();
        if term < current_term {
            return Ok((current_term, false, None));
        }

        // A valid leader message for our term: accept it as leader and
        // reset the election timer, even if we were a candidate.
        inner.role = RaftRole::Follower;
        inner.current_leader = Some(leader_id);
        inner.election_deadline = Instant::now() + random_election_timeout(&self.timing);

        if prev_log_index > 0 {
            match inner.store.entry_at(prev_log_index) {
                Some(entry) if entry.term == prev_log_term => {}
                _ => {
                    let (our_last, _) = inner.store.last_index_and_term();
                    return Ok((current_term, false, Some(our_last.min(prev_log_index))));
                }
            }
        }

        for entry in entries {
            match inner.store.entry_at(entry.index) {
                Some(existing) if existing.term == entry.term => {}
                Some(_) => {
                    inner
                        .store
                        .truncate_from(entry.index)
                        .map_err(LedgerError::from)?;
                    inner.store.append_entry(entry).map_err(LedgerError::from)?;
                }
                None => {
                    inner.store.append_entry(entry).map_err(LedgerError::from)?;
                }
            }
        }

        let (last_new_index, _) = inner.store.last_index_and_term();
        if leader_commit > inner.commit_index {
            inner.commit_index = leader_commit.min(last_new_index);
            self.apply_committed(&mut inner);
        }

        Ok((current_term, true, Some(last_new_index)))
    }

    /// Step down to follower, clearing the vote, if `term` is newer than
    /// ours. Must be called while holding `inner`'s lock.
    async fn step_down_if_stale(&self, inner: &mut Inner, term: RaftTerm) {
        if term > inner.store.current_term() {
            #[allow(clippy::unwrap_used)]
            inner.store.persist_term_and_vote(term, None).unwrap_or_else(|err| {
                warn!(node_id = %self.node_id, %err, "failed to persist stepped-down term");
            });
            inner.role = RaftRole::Follower;
            inner.current_leader = None;
            inner.votes_received.clear();
        }
    }

    /// Apply every newly committed entry, in order, releasing nobody's
    /// lock but the caller's own (this runs with `inner` already held).
    fn apply_committed(&self, inner: &mut Inner) {
        while inner.last_applied < inner.commit_index {
            let next = inner.last_applied + 1;
            if let Some(entry) = inner.store.entry_at(next).cloned() {
                self.state_machine.apply(&entry);
                inner.last_applied = next;
            } else {
                break;
            }
        }
        self.commit_notify.notify_waiters();
    }

    fn majority(&self) -> usize {
        (self.peers.len() + 1) / 2 + 1
    }

    /// One round of replication: send `AppendEntries` to every peer,
    /// update `next_index`/`match_index`, and advance `commit_index` per
    /// the current-term safety rule (§4.1).
    async fn replicate_once(&self) {
        if self.is_crashed() {
            return;
        }
        let (term, leader_id, peer_calls) = {
            let inner = self.inner.lock().await;
            if inner.role != RaftRole::Leader {
                return;
            }
            let term = inner.store.current_term();
            let leader_id = self.node_id.clone();
            let mut calls = Vec::new();
            for peer in &self.peers {
                let next_index = *inner.next_index.get(peer).unwrap_or(&1);
                let prev_log_index = next_index.saturating_sub(1);
                let prev_log_term = if prev_log_index == 0 {
                    0
                } else {
                    inner
                        .store
                        .entry_at(prev_log_index)
                        .map_or(0, |entry| entry.term)
                };
                let (last_index, _) = inner.store.last_index_and_term();
                let entries: Vec<LogEntry> = (next_index..=last_index)
                    .filter_map(|index| inner.store.entry_at(index).cloned())
                    .collect();
                calls.push((peer.clone(), prev_log_index, prev_log_term, entries));
            }
            (term, leader_id, calls)
        };

        let leader_commit = self.inner.lock().await.commit_index;
        let mut handles = Vec::new();
        for (peer, prev_log_index, prev_log_term, entries) in peer_calls {
            let table = self.table.clone();
            let leader_id = leader_id.clone();
            handles.push(tokio::spawn(async move {
                let endpoint = table.endpoint(&peer).ok()?;
                let request = ledger_core::RpcRequest::AppendEntries {
                    term,
                    leader_id,
                    prev_log_index,
                    prev_log_term,
                    entries,
                    leader_commit,
                };
                let response = ledger_transport::client::call(endpoint, &request)
                    .await
                    .ok()?;
                match response {
                    ledger_core::RpcResponse::AppendResult {
                        term,
                        success,
                        match_index,
                    } => Some((peer, term, success, match_index)),
                    _ => None,
                }
            }));
        }

        let mut inner = self.inner.lock().await;
        for handle in handles {
            let Ok(Some((peer, resp_term, success, match_index))) = handle.await else {
                continue;
            };
            if resp_term > inner.store.current_term() {
                self.step_down_if_stale(&mut inner, resp_term).await;
                return;
            }
            if inner.role != RaftRole::Leader {
                return;
            }
            if success {
                if let Some(match_idx) = match_index {
                    inner.match_index.insert(peer.clone(), match_idx);
                    inner.next_index.insert(peer, match_idx + 1);
                }
            } else {
                let next = inner.next_index.entry(peer).or_insert(1);
                *next = next.saturating_sub(1).max(1);
            }
        }

        self.advance_commit_index(&mut inner);
    }

    /// Recompute `commit_index` from `match_index` using the standard
    /// majority-plus-current-term rule (§4.1's "Commit rule").
    fn advance_commit_index(&self, inner: &mut Inner) {
        let term = inner.store.current_term();
        let (self_last_index, _) = inner.store.last_index_and_term();
        let mut indices: Vec<LogIndex> = self.peers.iter().map(|peer| {
            *inner.match_index.get(peer).unwrap_or(&0)
        }).collect();
        indices.push(self_last_index);
        indices.sort_unstable_by(|a, b| b.cmp(a));

        let majority = self.majority();
        if majority == 0 || majority > indices.len() {
            return;
        }
        let candidate = indices[majority - 1];
        if candidate <= inner.commit_index {
            return;
        }
        let candidate_term = inner.store.entry_at(candidate).map(|entry| entry.term);
        if candidate_term == Some(term) {
            inner.commit_index = candidate;
            self.apply_committed(inner);
        }
    }

    /// Background task: sends heartbeats (possibly carrying pending
    /// entries) on every leader tick, per §5.
    async fn run_heartbeat_sender(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.timing.heartbeat_interval);
        loop {
            ticker.tick().await;
            if self.is_leader().await {
                self.replicate_once().await;
            }
        }
    }

    /// Background task: the election timer described in §4.1 and §5.
    /// Resets on a valid heartbeat/append from the current leader or a
    /// granted vote; on expiry, becomes candidate and runs an election.
    async fn run_election_timer(self: Arc<Self>) {
        loop {
            let deadline = self.inner.lock().await.election_deadline;
            let now = Instant::now();
            if now < deadline {
                tokio::time::sleep(deadline - now).await;
                continue;
            }
            if self.is_crashed() {
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
            let already_leader = self.inner.lock().await.role == RaftRole::Leader;
            if already_leader {
                tokio::time::sleep(self.timing.heartbeat_interval).await;
                continue;
            }
            self.run_election().await;
        }
    }

    /// Become candidate, vote for self, and request votes from peers
    /// (§4.1). Becomes leader on a majority; otherwise remains a
    /// follower/candidate for the next timeout.
    async fn run_election(self: &Arc<Self>) {
        let (term, last_log_index, last_log_term) = {
            let mut inner = self.inner.lock().await;
            let new_term = inner.store.current_term() + 1;
            inner
                .store
                .persist_term_and_vote(new_term, Some(self.node_id.clone()))
                .unwrap_or_else(|err| {
                    warn!(node_id = %self.node_id, %err, "failed to persist candidacy");
                });
            inner.role = RaftRole::Candidate;
            inner.current_leader = None;
            inner.votes_received.clear();
            inner.votes_received.insert(self.node_id.clone());
            inner.election_deadline = Instant::now() + random_election_timeout(&self.timing);
            let (last_index, last_term) = inner.store.last_index_and_term();
            (new_term, last_index, last_term)
        };

        info!(node_id = %self.node_id, term, "starting election");

        let mut handles = Vec::new();
        for peer in &self.peers {
            let table = self.table.clone();
            let peer = peer.clone();
            let candidate_id = self.node_id.clone();
            handles.push(tokio::spawn(async move {
                let endpoint = table.endpoint(&peer).ok()?;
                let request = ledger_core::RpcRequest::RequestVote {
                    term,
                    candidate_id,
                    last_log_index,
                    last_log_term,
                };
                let response = ledger_transport::client::call(endpoint, &request)
                    .await
                    .ok()?;
                match response {
                    ledger_core::RpcResponse::VoteResult { term, vote_granted } => {
                        Some((peer, term, vote_granted))
                    }
                    _ => None,
                }
            }));
        }

        for handle in handles {
            let Ok(Some((peer, resp_term, granted))) = handle.await else {
                continue;
            };
            let mut inner = self.inner.lock().await;
            if resp_term > inner.store.current_term() {
                self.step_down_if_stale(&mut inner, resp_term).await;
                return;
            }
            if inner.role != RaftRole::Candidate || inner.store.current_term() != term {
                return;
            }
            if granted {
                inner.votes_received.insert(peer);
            }
            if inner.votes_received.len() >= self.majority() {
                self.become_leader(&mut inner).await;
                return;
            }
        }
    }

    /// Transition to leader: initialize `next_index`/`match_index` and
    /// append a no-op entry for the current term, per the common
    /// "commit an entry from the current term immediately" practice
    /// referenced in §4.1's commit rule.
    async fn become_leader(self: &Arc<Self>, inner: &mut Inner) {
        info!(node_id = %self.node_id, term = inner.store.current_term(), "became leader");
        inner.role = RaftRole::Leader;
        inner.current_leader = Some(self.node_id.clone());
        let (last_index, _) = inner.store.last_index_and_term();
        for peer in &self.peers {
            inner.next_index.insert(peer.clone(), last_index + 1);
            inner.match_index.insert(peer.clone(), 0);
        }
        inner.match_index.insert(self.node_id.clone(), last_index);

        let term = inner.store.current_term();
        let noop_index = last_index + 1;
        if let Err(err) = inner.store.append_entry(LogEntry {
            index: noop_index,
            term,
            command: Command::Noop,
        }) {
            warn!(node_id = %self.node_id, %err, "failed to append no-op leader entry");
            return;
        }
        inner
            .match_index
            .insert(self.node_id.clone(), noop_index);

        Arc::clone(self).replicate_soon();
    }

    /// Kick off an immediate replication round in the background so a
    /// fresh leader's no-op (and thus commit-index advancement) doesn't
    /// wait for the next heartbeat tick.
    fn replicate_soon(self: Arc<Self>) {
        tokio::spawn(async move {
            self.replicate_once().await;
        });
    }
}

fn random_election_timeout(timing: &RaftTiming) -> Duration {
    let min = u64::try_from(timing.election_timeout_min.as_millis().max(1)).unwrap_or(u64::MAX);
    let max = u64::try_from(timing.election_timeout_max.as_millis())
        .unwrap_or(u64::MAX)
        .max(min.saturating_add(1));
    let millis = rand::thread_rng().gen_range(min..=max);
    Duration::from_millis(millis)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ledger_core::{ClusterTag, Endpoint, NodeEntry, RpcRequest, RpcResponse};
    use ledger_transport::{server, RpcHandler};
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Default)]
    struct RecordingStateMachine {
        applied: StdMutex<Vec<LogEntry>>,
    }

    impl StateMachine for RecordingStateMachine {
        fn apply(&self, entry: &LogEntry) {
            #[allow(clippy::unwrap_used)]
            self.applied.lock().unwrap().push(entry.clone());
        }
    }

    #[derive(Debug)]
    struct RaftOnlyHandler(Arc<RaftNode>);

    #[async_trait]
    impl RpcHandler for RaftOnlyHandler {
        async fn handle(&self, request: RpcRequest) -> RpcResponse {
            match request {
                RpcRequest::RequestVote {
                    term,
                    candidate_id,
                    last_log_index,
                    last_log_term,
                } => match self
                    .0
                    .handle_request_vote(term, candidate_id, last_log_index, last_log_term)
                    .await
                {
                    Ok((term, vote_granted)) => RpcResponse::VoteResult { term, vote_granted },
                    Err(err) => RpcResponse::Error {
                        error: err.to_string(),
                    },
                },
                RpcRequest::AppendEntries {
                    term,
                    leader_id,
                    prev_log_index,
                    prev_log_term,
                    entries,
                    leader_commit,
                } => match self
                    .0
                    .handle_append_entries(
                        term,
                        leader_id,
                        prev_log_index,
                        prev_log_term,
                        entries,
                        leader_commit,
                    )
                    .await
                {
                    Ok((term, success, match_index)) => RpcResponse::AppendResult {
                        term,
                        success,
                        match_index,
                    },
                    Err(err) => RpcResponse::Error {
                        error: err.to_string(),
                    },
                },
                _ => RpcResponse::Error {
                    error: "unsupported in raft-only test handler".to_string(),
                },
            }
        }

        fn is_available(&self) -> bool {
            !self.0.is_crashed()
        }
    }

    async fn free_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[derive(Debug)]
    struct Cluster {
        _dirs: Vec<tempfile::TempDir>,
        nodes: Vec<Arc<RaftNode>>,
        state_machines: Vec<Arc<RecordingStateMachine>>,
    }

    async fn spawn_cluster(timing: RaftTiming) -> Cluster {
        let ids = ["N1", "N2", "N3"];
        let mut entries = Vec::new();
        for id in ids {
            let port = free_port().await;
            entries.push(NodeEntry {
                node_id: id.to_string(),
                cluster: ClusterTag::A,
                endpoint: Endpoint::localhost(port),
            });
        }
        let table = NodeTable::from_entries(entries);

        let mut dirs = Vec::new();
        let mut nodes = Vec::new();
        let mut state_machines = Vec::new();

        for id in ids {
            let dir = tempfile::tempdir().unwrap();
            let store = ledger_storage::RaftStore::open(dir.path(), id).unwrap();
            let peers: Vec<NodeId> = ids
                .iter()
                .filter(|other| **other != id)
                .map(|other| (*other).to_string())
                .collect();
            let state_machine = Arc::new(RecordingStateMachine::default());
            let node = RaftNode::new(
                id.to_string(),
                peers,
                table.clone(),
                store,
                timing,
                Arc::clone(&state_machine) as Arc<dyn StateMachine>,
            );
            let endpoint = table.endpoint(id).unwrap();
            let handler = Arc::new(RaftOnlyHandler(Arc::clone(&node)));
            tokio::spawn(server::serve(endpoint, handler));
            node.spawn_background_tasks();
            nodes.push(node);
            state_machines.push(state_machine);
            dirs.push(dir);
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        Cluster {
            _dirs: dirs,
            nodes,
            state_machines,
        }
    }

    fn fast_timing() -> RaftTiming {
        RaftTiming {
            election_timeout_min: Duration::from_millis(100),
            election_timeout_max: Duration::from_millis(200),
            heartbeat_interval: Duration::from_millis(30),
        }
    }

    async fn wait_for_leader(cluster: &Cluster) -> Arc<RaftNode> {
        for _ in 0..100 {
            for node in &cluster.nodes {
                if node.is_leader().await {
                    return Arc::clone(node);
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no leader elected in time");
    }

    #[tokio::test]
    async fn elects_exactly_one_leader() {
        let cluster = spawn_cluster(fast_timing()).await;
        let leader = wait_for_leader(&cluster).await;

        let mut leader_count = 0;
        for node in &cluster.nodes {
            if node.is_leader().await {
                leader_count += 1;
            }
        }
        assert_eq!(leader_count, 1);
        assert!(leader.is_leader().await);
    }

    #[tokio::test]
    async fn proposed_command_replicates_and_applies_everywhere() {
        let cluster = spawn_cluster(fast_timing()).await;
        let leader = wait_for_leader(&cluster).await;

        let index = leader
            .propose(Command::SetBalance { value: 42 })
            .await
            .unwrap();
        leader
            .wait_for_commit(index, Duration::from_secs(2))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        for state_machine in &cluster.state_machines {
            let applied = state_machine.applied.lock().unwrap();
            let found = applied.iter().any(|entry| {
                matches!(entry.command, Command::SetBalance { value } if value == 42)
            });
            assert!(found, "every replica should eventually apply the command");
        }
    }

    #[tokio::test]
    async fn trigger_leader_change_forces_a_new_election() {
        let cluster = spawn_cluster(fast_timing()).await;
        let first_leader = wait_for_leader(&cluster).await;
        let first_term = first_leader.current_term().await;

        let stepped_down = first_leader.trigger_leader_change().await;
        assert!(stepped_down);
        assert!(!first_leader.is_leader().await);

        tokio::time::sleep(Duration::from_millis(400)).await;
        let new_leader = wait_for_leader(&cluster).await;
        assert!(new_leader.current_term().await >= first_term);
    }

    #[tokio::test]
    async fn simulated_crash_marks_node_unavailable_then_recovers() {
        let cluster = spawn_cluster(fast_timing()).await;
        let node = Arc::clone(&cluster.nodes[0]);
        assert!(!node.is_crashed());
        node.simulate_crash();
        assert!(node.is_crashed());
    }
}
