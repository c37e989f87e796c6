//! The reconcile sequence: clear, load, dump.

use cheetah_bfrt::BfrtSession;
use cheetah_reconcile::{ReconcileReport, ReconcilerConfig, TableReconciler};
use log::{info, warn};
use std::sync::Arc;

use crate::config::Config;
use crate::error::RunError;
use crate::inspector::{Inspector, Snapshot};
use crate::loader::{LoadReport, StaticStateLoader};
use crate::rules::LoadPlan;

/// Phases to run after clearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phases {
    pub load: bool,
    pub dump: bool,
}

impl Phases {
    pub const CLEAR: Phases = Phases {
        load: false,
        dump: false,
    };
    pub const LOAD: Phases = Phases {
        load: true,
        dump: false,
    };
    pub const ALL: Phases = Phases {
        load: true,
        dump: true,
    };
}

/// Results of a run, one field per phase.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub cleared: ReconcileReport,
    pub loaded: Option<LoadReport>,
    pub dump: Vec<Snapshot>,
}

pub fn reconciler_config(config: &Config) -> ReconcilerConfig {
    ReconcilerConfig {
        verbose: config.reconcile.verbose,
        batching: config.reconcile.batching,
    }
}

/// Clears the pipeline, then runs the requested phases.
pub async fn run(
    session: Arc<dyn BfrtSession>,
    config: &Config,
    phases: Phases,
) -> Result<RunReport, RunError> {
    info!("Reconciling {}", session.program());

    let reconciler = TableReconciler::new(session.clone(), reconciler_config(config));
    let cleared = reconciler.clear_all().await?;
    for failure in cleared.failures() {
        warn!(
            "{} left in place: {}",
            failure.object.full_name, failure.outcome
        );
    }

    let mut report = RunReport {
        cleared,
        ..RunReport::default()
    };

    if phases.load {
        let plan = LoadPlan::from_config(config);
        let loaded = StaticStateLoader::new(session.clone())
            .load(&report.cleared, &plan)
            .await?;
        info!(
            "Loaded {} rules, reset {} register cells",
            loaded.rules_added(),
            loaded.registers_reset
        );
        report.loaded = Some(loaded);
    }

    if phases.dump {
        report.dump = Inspector::new(session)
            .dump_all(&config.dump.tables, &config.dump.registers, config.dump.from_hw)
            .await?;
    }

    Ok(report)
}
