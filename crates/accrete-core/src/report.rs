//! Per-stage results aggregated into a run report

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, ErrorKind};
use crate::init::InitOutcome;

/// Counters produced by a merge strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Source records examined
    pub rows_read: usize,
    /// Records appended to the destination
    pub appended: usize,
    /// Records already present (by key or id)
    pub skipped_existing: usize,
    /// Records with no fields
    pub skipped_blank: usize,
    /// Records outside the processing window
    pub skipped_out_of_window: usize,
    /// Records dropped for missing required fields
    pub dropped_incomplete: usize,
}

/// A unit of work within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    InitIdentities,
    InitEvents,
    InitTransactions,
    Identities,
    Events,
    Deposits,
    Withdrawals,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitIdentities => "init_identities",
            Self::InitEvents => "init_events",
            Self::InitTransactions => "init_transactions",
            Self::Identities => "identities",
            Self::Events => "events",
            Self::Deposits => "deposits",
            Self::Withdrawals => "withdrawals",
        }
    }

    /// Merge stages, in pipeline order
    pub fn merges() -> &'static [Stage] {
        &[
            Self::Identities,
            Self::Events,
            Self::Deposits,
            Self::Withdrawals,
        ]
    }

    /// The initializer stage a merge depends on
    pub fn init_stage(&self) -> Stage {
        match self {
            Self::Identities | Self::InitIdentities => Self::InitIdentities,
            Self::Events | Self::InitEvents => Self::InitEvents,
            Self::Deposits | Self::Withdrawals | Self::InitTransactions => Self::InitTransactions,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "identities" | "users" => Ok(Self::Identities),
            "events" => Ok(Self::Events),
            "deposits" | "deposit" => Ok(Self::Deposits),
            "withdrawals" | "withdrawal" => Ok(Self::Withdrawals),
            _ => Err(format!(
                "Unknown dataset '{}'. Use one of: identities, events, deposits, withdrawals",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Initialized { result: InitOutcome },
    Completed { stats: MergeStats },
    Failed { kind: ErrorKind, message: String },
    Skipped { reason: String },
}

impl Outcome {
    pub fn failed(err: &Error) -> Self {
        Self::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Everything that happened during one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            stages: Vec::new(),
        }
    }

    pub fn record(&mut self, stage: Stage, outcome: Outcome) {
        self.stages.push(StageReport { stage, outcome });
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
    }

    pub fn outcome(&self, stage: Stage) -> Option<&Outcome> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }

    /// Stats of a completed merge stage
    pub fn stats(&self, stage: Stage) -> Option<MergeStats> {
        match self.outcome(stage) {
            Some(Outcome::Completed { stats }) => Some(*stats),
            _ => None,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageReport> {
        self.stages.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn total_appended(&self) -> usize {
        self.stages
            .iter()
            .filter_map(|r| match r.outcome {
                Outcome::Completed { stats } => Some(stats.appended),
                _ => None,
            })
            .sum()
    }
}
