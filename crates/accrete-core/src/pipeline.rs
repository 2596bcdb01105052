//! Pipeline runner
//!
//! Runs the destination initializer for every destination, then each merge
//! strategy in turn. Every stage returns its own outcome; a failure in one
//! dataset never stops the others. The caller gets a [`RunReport`] back and
//! decides what to do with failures.

use std::path::Path;

use tracing::{error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::PipelineConfig;
use crate::dataset::{summarize, DatasetSummary};
use crate::error::Result;
use crate::identity::{merge_identities, IdentityOptions};
use crate::init::ensure_destination;
use crate::keyset::open_key_set;
use crate::reconcile::{reconcile_transactions, ReconcileOptions, TransactionClass};
use crate::report::{MergeStats, Outcome, RunReport, Stage};
use crate::window::{append_window, ProcessingWindow, WindowOptions};

pub struct Pipeline {
    config: PipelineConfig,
    clock: Box<dyn Clock>,
}

impl Pipeline {
    /// Create a pipeline using the system clock
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    pub fn with_clock(config: PipelineConfig, clock: impl Clock + 'static) -> Self {
        Self {
            config,
            clock: Box::new(clock),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage
    pub fn run(&self) -> RunReport {
        let started_at = self.clock.now();
        let window = ProcessingWindow::for_day(started_at.date_naive());
        info!("Starting pipeline run (window {})", window.day);

        let mut report = RunReport::new(started_at);
        for stage in [
            Stage::InitIdentities,
            Stage::InitEvents,
            Stage::InitTransactions,
        ] {
            self.run_init(stage, &mut report);
        }
        for &stage in Stage::merges() {
            self.run_merge(stage, window, &mut report);
        }

        report.finish(self.clock.now());
        log_summary(&report);
        report
    }

    /// Run one stage, preceded by the initializer for its destination
    pub fn run_stage(&self, stage: Stage) -> RunReport {
        let started_at = self.clock.now();
        let window = ProcessingWindow::for_day(started_at.date_naive());

        let mut report = RunReport::new(started_at);
        self.run_init(stage.init_stage(), &mut report);
        if stage != stage.init_stage() {
            self.run_merge(stage, window, &mut report);
        }

        report.finish(self.clock.now());
        log_summary(&report);
        report
    }

    /// Only initialize destinations
    pub fn initialize(&self) -> RunReport {
        let mut report = RunReport::new(self.clock.now());
        for stage in [
            Stage::InitIdentities,
            Stage::InitEvents,
            Stage::InitTransactions,
        ] {
            self.run_init(stage, &mut report);
        }
        report.finish(self.clock.now());
        report
    }

    /// Row counts and digests of every destination
    pub fn summaries(&self) -> Result<Vec<DatasetSummary>> {
        let delimiter = self.config.delimiter_byte()?;
        self.config
            .destinations()
            .into_iter()
            .map(|(path, _)| summarize(path, delimiter))
            .collect()
    }

    fn run_init(&self, stage: Stage, report: &mut RunReport) {
        let config = &self.config;
        let (path, header) = match stage {
            Stage::InitIdentities => (&config.identities.destination, &config.identities.header),
            Stage::InitEvents => (&config.events.destination, &config.events.header),
            _ => (&config.transactions.destination, &config.transactions.header),
        };

        let result = config
            .delimiter_byte()
            .and_then(|delimiter| ensure_destination(path, header, delimiter));

        let outcome = match result {
            Ok(result) => Outcome::Initialized { result },
            Err(e) => {
                error!("Failed to initialize {}: {}", path.display(), e);
                Outcome::failed(&e)
            }
        };
        report.record(stage, outcome);
    }

    fn run_merge(&self, stage: Stage, window: ProcessingWindow, report: &mut RunReport) {
        let init = stage.init_stage();
        if report.outcome(init).is_some_and(Outcome::is_failure) {
            warn!("Skipping {}: {} failed", stage, init);
            report.record(
                stage,
                Outcome::Skipped {
                    reason: format!("{} failed", init),
                },
            );
            return;
        }

        info!("Running {} merge", stage);
        let outcome = match self.execute(stage, window) {
            Ok(stats) => Outcome::Completed { stats },
            Err(e) => {
                error!("{} merge failed ({}): {}", stage, e.kind(), e);
                Outcome::failed(&e)
            }
        };
        report.record(stage, outcome);
    }

    fn execute(&self, stage: Stage, window: ProcessingWindow) -> Result<MergeStats> {
        let config = &self.config;
        let delimiter = config.delimiter_byte()?;

        match stage {
            Stage::Identities => {
                let ids = &config.identities;
                let mut keys = open_key_set(ids.key_index, ids.index_path.as_deref())?;
                let options = IdentityOptions {
                    delimiter,
                    source_has_header: ids.source_has_header,
                };
                merge_identities(
                    &ids.source,
                    &ids.destination,
                    &options,
                    keys.as_mut(),
                    self.clock.as_ref(),
                )
            }
            Stage::Events => {
                let events = &config.events;
                let options = WindowOptions {
                    delimiter,
                    timestamp_column: events.timestamp_column.clone(),
                    timestamp_format: events.timestamp_format.clone(),
                };
                append_window(&events.source, &events.destination, &options, window)
            }
            Stage::Deposits | Stage::Withdrawals => {
                let txs = &config.transactions;
                let (class, source) = if stage == Stage::Deposits {
                    (TransactionClass::Deposit, &txs.deposit_source)
                } else {
                    (TransactionClass::Withdrawal, &txs.withdrawal_source)
                };
                let options = ReconcileOptions {
                    delimiter,
                    incomplete: txs.incomplete,
                };
                reconcile_transactions(source, &txs.destination, class, &options)
            }
            Stage::InitIdentities | Stage::InitEvents | Stage::InitTransactions => {
                unreachable!("{} is not a merge stage", stage)
            }
        }
    }
}

fn log_summary(report: &RunReport) {
    let failed = report.failures().count();
    if failed == 0 {
        info!(
            "Pipeline run complete: {} rows appended",
            report.total_appended()
        );
    } else {
        warn!(
            "Pipeline run complete with {} failed stage(s): {} rows appended",
            failed,
            report.total_appended()
        );
    }
}

/// Entry point for external schedulers
///
/// Resolves configuration with the default lookup order (falling back to the
/// built-in defaults if it cannot be loaded), runs every stage and returns the
/// report. Never panics on dataset failures.
pub fn run_pipeline() -> RunReport {
    run_with(PipelineConfig::load(None), None, SystemClock)
}

fn run_with(
    loaded: Result<PipelineConfig>,
    base_dir: Option<&Path>,
    clock: impl Clock + 'static,
) -> RunReport {
    let config = loaded.unwrap_or_else(|e| {
        warn!("Using default configuration: {}", e);
        PipelineConfig::default()
    });
    let config = match base_dir {
        Some(base) => config.with_base_dir(base),
        None => config,
    };
    Pipeline::with_clock(config, clock).run()
}
