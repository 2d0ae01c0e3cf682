//! Fault-injection scenario tags.
//!
//! The original source keeps these as a module-level enum of small
//! integers threaded through transaction requests to trigger a specific
//! crash at a specific point. Per the re-architecture guidance this
//! becomes a proper Rust enum rather than a bare integer compared by
//! value at each call site.

use serde::{Deserialize, Serialize};

/// A fault to inject while processing a single 2PC transaction.
///
/// `None` is the ordinary, no-fault path. The remaining variants
/// correspond to the numbered scenarios of the source simulation
/// configuration (`config.py`), plus the coordinator-crash-after-prepare
/// tag named explicitly in this specification's scenario S5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SimulationScenario {
    /// No fault injected; the ordinary path.
    #[default]
    None,
    /// A participant crashes before replying to `2pc_prepare`.
    CrashBeforePrepare,
    /// A participant crashes after preparing but before replying to
    /// `2pc_commit`.
    CrashBeforeCommit,
    /// The coordinator crashes before sending `2pc_commit` to any
    /// participant, after both participants have already prepared.
    CoordinatorCrashBeforeCommit,
    /// The coordinator's prepare-log and commit-log entries for this
    /// transaction are deliberately constructed with different
    /// transaction ids, exercising the recovery comparison in §4.4.
    CoordinatorDifferentPrepareCommitLog,
    /// The coordinator recovers (resumes) after having already sent
    /// `2pc_prepare`, i.e. the crash-and-resume path of scenario S5.
    CoordinatorCrashAfterSendingPrepare,
}

impl SimulationScenario {
    /// Parse the small integer tag used on the wire
    /// (`simulation_num` in the `2pc_request`/`2pc_prepare`/`2pc_commit`
    /// payloads), matching the original source's 1-indexed enum.
    ///
    /// # Errors
    ///
    /// Returns `Err` with the unrecognized value if `tag` is not one of
    /// the known scenario numbers.
    pub fn from_wire_tag(tag: u32) -> Result<Self, u32> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::CrashBeforePrepare),
            2 => Ok(Self::CrashBeforeCommit),
            3 => Ok(Self::CoordinatorCrashBeforeCommit),
            4 => Ok(Self::CoordinatorDifferentPrepareCommitLog),
            5 => Ok(Self::CoordinatorCrashAfterSendingPrepare),
            other => Err(other),
        }
    }

    /// The wire-format integer tag for this scenario.
    #[must_use]
    pub fn wire_tag(self) -> u32 {
        match self {
            Self::None => 0,
            Self::CrashBeforePrepare => 1,
            Self::CrashBeforeCommit => 2,
            Self::CoordinatorCrashBeforeCommit => 3,
            Self::CoordinatorDifferentPrepareCommitLog => 4,
            Self::CoordinatorCrashAfterSendingPrepare => 5,
        }
    }
}

/// Duration a simulated crash detaches a node or the coordinator from the
/// network, per §4.1 and §4.4.
pub const SIMULATED_CRASH_DURATION: std::time::Duration = std::time::Duration::from_secs(10);
