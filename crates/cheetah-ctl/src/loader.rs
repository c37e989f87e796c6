//! Static state loader.
//!
//! Installs the literal forwarding rules of a [`LoadPlan`] and zeroes the
//! configured registers. Unlike clearing, loading has no per-object
//! failure boundary: the first rejected write stops the load.

use cheetah_bfrt::{BfrtError, BfrtSession};
use cheetah_reconcile::ReconcileReport;
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::RegisterConfig;
use crate::error::LoadError;
use crate::rules::{ForwardingRule, LoadPlan};

/// What a load installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Rules added per table, in load order.
    pub tables: Vec<(String, usize)>,
    /// Register cells written.
    pub registers_reset: usize,
}

impl LoadReport {
    pub fn rules_added(&self) -> usize {
        self.tables.iter().map(|(_, n)| n).sum()
    }
}

pub struct StaticStateLoader {
    session: Arc<dyn BfrtSession>,
}

impl StaticStateLoader {
    pub fn new(session: Arc<dyn BfrtSession>) -> Self {
        Self { session }
    }

    /// Loads `plan` onto tables cleared in `cleared`.
    ///
    /// Every table receiving rules must appear in `cleared` as cleared or
    /// already empty; failures on other objects do not block the load.
    /// Registers are reset after the rules, or before refusing the rules
    /// when a target table was left uncleared.
    pub async fn load(
        &self,
        cleared: &ReconcileReport,
        plan: &LoadPlan,
    ) -> Result<LoadReport, LoadError> {
        let uncleared = plan
            .tables()
            .into_iter()
            .find(|(table, rules)| !rules.is_empty() && !cleared.is_cleared(table));
        if let Some((table, _)) = uncleared {
            let written = self.reset_registers(&plan.registers).await?;
            info!("Reset {} register cells before refusing the rules", written);
            return Err(LoadError::NotCleared {
                table: table.to_string(),
            });
        }

        debug!("Loading {} rules", plan.rule_count());
        let mut report = LoadReport::default();
        for (table, rules) in plan.tables() {
            if rules.is_empty() {
                continue;
            }
            for rule in rules {
                self.add_forwarding_rule(table, rule).await?;
            }
            info!("Loaded {} rules into {}", rules.len(), table);
            report.tables.push((table.to_string(), rules.len()));
        }

        report.registers_reset = self.reset_registers(&plan.registers).await?;
        Ok(report)
    }

    /// Adds one rule. A duplicate key is reported as
    /// [`LoadError::Rule`] carrying `BF_ALREADY_EXISTS`.
    pub async fn add_forwarding_rule(
        &self,
        table: &str,
        rule: &ForwardingRule,
    ) -> Result<(), LoadError> {
        debug!("{}: add {}", table, rule);
        self.session
            .add_entry(table, rule.to_entry())
            .await
            .map_err(|source| {
                if source.is_transport() {
                    LoadError::Transport { source }
                } else {
                    LoadError::Rule {
                        table: table.to_string(),
                        rule: rule.to_string(),
                        source,
                    }
                }
            })
    }

    /// Writes zero into `fields` of register `name` at `index`.
    pub async fn reset_register(
        &self,
        name: &str,
        index: u32,
        fields: &[String],
    ) -> Result<(), LoadError> {
        let values: BTreeMap<String, u64> = fields.iter().map(|f| (f.clone(), 0)).collect();
        self.session
            .write_register(name, index, &values)
            .await
            .map_err(|source| register_error(name, index, source))
    }

    /// Resets every configured register index. Returns the cells written.
    pub async fn reset_registers(&self, registers: &[RegisterConfig]) -> Result<usize, LoadError> {
        let mut written = 0;
        for reg in registers {
            for &index in &reg.indices {
                self.reset_register(&reg.name, index, &reg.fields).await?;
                written += 1;
            }
            debug!("{}: reset {} indices", reg.name, reg.indices.len());
        }
        Ok(written)
    }
}

fn register_error(name: &str, index: u32, source: BfrtError) -> LoadError {
    if source.is_transport() {
        LoadError::Transport { source }
    } else {
        LoadError::Register {
            name: name.to_string(),
            index,
            source,
        }
    }
}
