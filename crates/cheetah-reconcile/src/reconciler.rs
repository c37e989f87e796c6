//! Table reconciler.
//!
//! Clears one object at a time behind a per-object failure boundary: a
//! broken object produces [`ClearOutcome::Failed`] and the run moves on.
//! Only a transport failure stops the run, because no later call on the
//! same session can succeed.

use cheetah_bfrt::{BfrtError, BfrtSession, DataplaneObject, Entry};
use log::{debug, info, warn};
use std::sync::Arc;

use crate::batch::with_batch;
use crate::catalog::Catalog;
use crate::error::{ClearFailure, ReconcileError, Result};
use crate::ordering::{self, ordered_kind_groups, KindGroup};
use crate::outcome::{ClearOutcome, DefaultReset, ObjectReport, ReconcileReport};

/// Configuration for [`TableReconciler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Log one progress line per object at info level.
    pub verbose: bool,
    /// Wrap the removals for each object in a device batch.
    pub batching: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            verbose: true,
            batching: true,
        }
    }
}

#[derive(Default)]
struct RemovalTally {
    removed: usize,
    failed: usize,
    first_cause: Option<BfrtError>,
    transport: Option<BfrtError>,
}

/// Clears pipeline objects in dependency order.
pub struct TableReconciler {
    session: Arc<dyn BfrtSession>,
    catalog: Catalog,
    config: ReconcilerConfig,
}

impl TableReconciler {
    pub fn new(session: Arc<dyn BfrtSession>, config: ReconcilerConfig) -> Self {
        Self {
            catalog: Catalog::new(session.clone()),
            session,
            config,
        }
    }

    /// Clears every kind group in order: match tables, then selectors, then
    /// action profiles. The catalog is re-read for each group.
    pub async fn clear_all(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new();
        for group in ordered_kind_groups() {
            self.clear_group(group, &mut report).await?;
        }
        info!("Clear complete on {}: {}", self.session.program(), report);
        Ok(report)
    }

    /// Clears every object of one kind group, appending to `report`.
    ///
    /// Callers clearing groups individually must follow
    /// [`ordered_kind_groups`] themselves.
    pub async fn clear_group(&self, group: &KindGroup, report: &mut ReconcileReport) -> Result<()> {
        let objects = self.catalog.list_objects(group.kinds).await?;
        info!("Clearing {} ({} objects)", group.name, objects.len());
        for object in &objects {
            report.push(self.clear(object).await?);
        }
        Ok(())
    }

    /// Clears one object.
    ///
    /// Lists the entries, removes each one (inside a batch when enabled),
    /// then resets the default action. Returns `Err` only on transport
    /// failure.
    ///
    /// Must not be called on a selector before every match table has been
    /// cleared, nor on an action profile before every selector.
    pub async fn clear(&self, object: &DataplaneObject) -> Result<ObjectReport> {
        let name = object.name.as_str();

        let outcome = match self.session.entries(name).await {
            Ok(entries) if entries.is_empty() => ClearOutcome::AlreadyEmpty,
            Ok(entries) => self.remove_entries(name, &entries).await?,
            Err(e) if e.is_transport() => return Err(ReconcileError::transport(name, e)),
            Err(e) if e.is_not_found() => ClearOutcome::AlreadyEmpty,
            Err(e) => ClearOutcome::Failed(ClearFailure::ListFailed(e)),
        };

        // Runs whatever the removal outcome was.
        let default_reset = match self.session.reset_default(name).await {
            Ok(()) => DefaultReset::Reset,
            Err(e) if e.is_transport() => return Err(ReconcileError::transport(name, e)),
            Err(e) => {
                debug!("{}: no default action to reset ({})", name, e);
                DefaultReset::Unsupported(e)
            }
        };

        let report = ObjectReport {
            object: object.clone(),
            group: group_label(object),
            outcome,
            default_reset,
        };

        if let ClearOutcome::Failed(failure) = &report.outcome {
            warn!("Problem clearing table {}: {}", name, failure);
        }
        if self.config.verbose {
            info!("{}", report.progress_line());
        } else {
            debug!("{}", report.progress_line());
        }
        Ok(report)
    }

    async fn remove_entries(&self, name: &str, entries: &[Entry]) -> Result<ClearOutcome> {
        let session: &dyn BfrtSession = self.session.as_ref();

        let batched = with_batch(session, self.config.batching, move || async move {
            let mut tally = RemovalTally::default();
            for entry in entries {
                match session.remove_entry(name, &entry.key).await {
                    Ok(()) => tally.removed += 1,
                    Err(e) if e.is_transport() => {
                        tally.transport = Some(e);
                        break;
                    }
                    Err(e) => {
                        debug!("{}: failed to remove {}: {}", name, entry.key, e);
                        tally.failed += 1;
                        if tally.first_cause.is_none() {
                            tally.first_cause = Some(e);
                        }
                    }
                }
            }
            tally
        })
        .await;

        let batched = match batched {
            Ok(batched) => batched,
            Err(e) if e.is_transport() => return Err(ReconcileError::transport(name, e)),
            Err(e) => return Ok(ClearOutcome::Failed(ClearFailure::BatchBegin(e))),
        };

        let tally = batched.value;
        if let Some(e) = tally.transport {
            return Err(ReconcileError::transport(name, e));
        }
        if let Some(cause) = &batched.close_error {
            if cause.is_transport() {
                return Err(ReconcileError::transport(name, cause.clone()));
            }
        }

        match (tally.first_cause, batched.close_error) {
            (Some(first_cause), close_error) => {
                if let Some(cause) = close_error {
                    warn!("{}: batch end also failed: {}", name, cause);
                }
                Ok(ClearOutcome::Failed(ClearFailure::RemovalFailed {
                    removed: tally.removed,
                    failed: tally.failed,
                    first_cause,
                }))
            }
            (None, Some(cause)) => Ok(ClearOutcome::Failed(ClearFailure::BatchEnd {
                removed: tally.removed,
                cause,
            })),
            (None, None) => Ok(ClearOutcome::Cleared(tally.removed)),
        }
    }
}

fn group_label(object: &DataplaneObject) -> &'static str {
    ordering::rank(object.kind)
        .map(|r| ordered_kind_groups()[r].name)
        .unwrap_or("unordered")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cheetah_bfrt::{
        ActionSpec, BfrtStatus, EntryKey, EntryRef, ObjectKind, SessionCall, SimSession,
        SimSnapshot, ACTION_MEMBER_ID, SELECTOR_GROUP_ID,
    };
    use pretty_assertions::assert_eq;

    const CLIENT: &str = "pipe.Ingress.get_client";
    const BUCKET: &str = "pipe.Ingress.get_server_from_bucket";
    const LB: &str = "pipe.Ingress.lb";
    const SEL: &str = "pipe.Ingress.lb_sel";
    const AP: &str = "pipe.Ingress.lb_ap";

    fn bucket_key(id: u32) -> EntryKey {
        EntryKey::new().with("bucket_id", id)
    }

    fn bucket_entry(id: u32) -> Entry {
        Entry::new(
            bucket_key(id),
            ActionSpec::new("fwd_to_server").with_param("egress_port", 52u16),
        )
    }

    /// Action profile and selector are declared first so that catalog order
    /// is the reverse of the safe clearing order.
    fn pipeline() -> Arc<SimSession> {
        let mut snapshot = SimSnapshot::new("cheetah_quic_and_hash_pipeline")
            .table(AP, ObjectKind::ActionProfile)
            .table(SEL, ObjectKind::Selector)
            .table_with_default(LB, ObjectKind::MatchIndirectSelector, ActionSpec::new("drop"))
            .table_with_default(CLIENT, ObjectKind::MatchDirect, ActionSpec::new("NoAction"))
            .table(BUCKET, ObjectKind::MatchDirect)
            .register("pipe.Ingress.bucket_counter_reg", 1, &["f1"]);
        for member in 1..=2u32 {
            snapshot = snapshot.entry(
                AP,
                Entry::new(
                    EntryKey::new().with(ACTION_MEMBER_ID, member),
                    ActionSpec::new("fwd").with_param("port", member),
                ),
            );
        }
        snapshot = snapshot.entry(
            SEL,
            Entry::bare(EntryKey::new().with(SELECTOR_GROUP_ID, 100u32))
                .with_ref(EntryRef::profile_member(AP, 1))
                .with_ref(EntryRef::profile_member(AP, 2)),
        );
        snapshot = snapshot.entry(
            LB,
            Entry::bare(EntryKey::new().with("vip", 1u32))
                .with_ref(EntryRef::selector_group(SEL, 100)),
        );
        for b in 0..3 {
            snapshot = snapshot.entry(BUCKET, bucket_entry(b));
        }
        Arc::new(SimSession::new(snapshot))
    }

    fn reconciler(sim: &Arc<SimSession>, batching: bool) -> TableReconciler {
        TableReconciler::new(
            sim.clone(),
            ReconcilerConfig {
                verbose: true,
                batching,
            },
        )
    }

    fn count(sim: &SimSession, pred: impl Fn(&SessionCall) -> bool) -> usize {
        sim.calls().iter().filter(|c| pred(c)).count()
    }

    fn object(sim: &SimSession, name: &str) -> DataplaneObject {
        sim.snapshot()
            .objects
            .into_iter()
            .find(|o| o.object.name == name)
            .map(|o| o.object)
            .unwrap()
    }

    #[tokio::test]
    async fn test_clear_bucket_table_removes_all_entries() {
        let sim = pipeline();
        let rec = reconciler(&sim, true);

        let report = rec.clear(&object(&sim, BUCKET)).await.unwrap();
        assert_eq!(report.outcome, ClearOutcome::Cleared(3));
        assert_eq!(sim.entry_count(BUCKET), 0);
        assert!(sim.entries(BUCKET).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_clear_empty_table_skips_remove() {
        let sim = pipeline();
        let rec = reconciler(&sim, true);

        let report = rec.clear(&object(&sim, CLIENT)).await.unwrap();
        assert_eq!(report.outcome, ClearOutcome::AlreadyEmpty);
        assert_eq!(count(&sim, |c| matches!(c, SessionCall::Remove(..))), 0);
        assert_eq!(count(&sim, |c| *c == SessionCall::BatchBegin), 0);
    }

    #[tokio::test]
    async fn test_clear_missing_table_is_already_empty() {
        let sim = pipeline();
        let rec = reconciler(&sim, true);
        let ghost = DataplaneObject::new("pipe.Ingress.ghost", ObjectKind::MatchDirect);

        let report = rec.clear(&ghost).await.unwrap();
        assert_eq!(report.outcome, ClearOutcome::AlreadyEmpty);
        assert!(!report.default_reset.is_reset());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let sim = pipeline();
        let rec = reconciler(&sim, true);

        let first = rec.clear_all().await.unwrap();
        assert!(!first.has_failures());
        let second = rec.clear_all().await.unwrap();
        assert_eq!(second.len(), 5);
        for report in second.objects() {
            assert_eq!(report.outcome, ClearOutcome::AlreadyEmpty, "{}", report.object.name);
        }
    }

    #[tokio::test]
    async fn test_groups_cleared_in_dependency_order() {
        let sim = pipeline();
        let rec = reconciler(&sim, true);

        let report = rec.clear_all().await.unwrap();
        assert!(!report.has_failures(), "{:?}", report.lines());
        assert_eq!(report.total_removed(), 7);

        let visited: Vec<&str> = report.objects().iter().map(|r| r.object.name.as_str()).collect();
        assert_eq!(visited, vec![LB, CLIENT, BUCKET, SEL, AP]);

        let calls = sim.calls();
        let position = |object: &str| {
            calls
                .iter()
                .enumerate()
                .filter(|(_, c)| match c {
                    SessionCall::Entries(o) | SessionCall::Remove(o, _) => o == object,
                    _ => false,
                })
                .map(|(i, _)| i)
                .collect::<Vec<_>>()
        };
        let last = |object: &str| *position(object).iter().max().unwrap();
        let first = |object: &str| *position(object).iter().min().unwrap();

        for matcher in [LB, CLIENT, BUCKET] {
            assert!(last(matcher) < first(SEL));
        }
        assert!(last(SEL) < first(AP));
    }

    #[tokio::test]
    async fn test_out_of_order_clear_reports_in_use() {
        let sim = pipeline();
        let rec = reconciler(&sim, false);

        let report = rec.clear(&object(&sim, AP)).await.unwrap();
        match &report.outcome {
            ClearOutcome::Failed(ClearFailure::RemovalFailed { removed, failed, first_cause }) => {
                assert_eq!((*removed, *failed), (0, 2));
                assert!(first_cause.is_in_use());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(sim.entry_count(AP), 2);
    }

    #[tokio::test]
    async fn test_batch_closed_once_despite_removal_failure() {
        let sim = pipeline();
        sim.fail_remove(BUCKET, bucket_key(1), BfrtStatus::HwUpdateFailed);
        let rec = reconciler(&sim, true);

        let report = rec.clear(&object(&sim, BUCKET)).await.unwrap();
        match &report.outcome {
            ClearOutcome::Failed(ClearFailure::RemovalFailed { removed, failed, .. }) => {
                assert_eq!((*removed, *failed), (2, 1));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(count(&sim, |c| *c == SessionCall::BatchBegin), 1);
        assert_eq!(count(&sim, |c| *c == SessionCall::BatchEnd), 1);
        assert!(!sim.is_batch_open());
        assert_eq!(sim.entry_count(BUCKET), 1);
        assert_eq!(
            count(&sim, |c| matches!(c, SessionCall::Remove(o, _) if o == BUCKET)),
            3
        );
    }

    #[tokio::test]
    async fn test_batch_end_failure_marks_object_failed() {
        let sim = pipeline();
        sim.fail_batch_end(BfrtStatus::HwUpdateFailed);
        let rec = reconciler(&sim, true);

        let report = rec.clear(&object(&sim, BUCKET)).await.unwrap();
        assert!(matches!(
            report.outcome,
            ClearOutcome::Failed(ClearFailure::BatchEnd { removed: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_no_batching_issues_no_batch_calls() {
        let sim = pipeline();
        let rec = reconciler(&sim, false);

        let report = rec.clear_all().await.unwrap();
        assert!(!report.has_failures());
        assert_eq!(
            count(&sim, |c| matches!(c, SessionCall::BatchBegin | SessionCall::BatchEnd)),
            0
        );
    }

    #[tokio::test]
    async fn test_list_failure_skips_object_and_continues() {
        let sim = pipeline();
        sim.fail_list(LB, BfrtStatus::TableLocked);
        let rec = reconciler(&sim, true);

        let report = rec.clear_all().await.unwrap();
        assert!(matches!(
            report.outcome_for(LB),
            Some(ClearOutcome::Failed(ClearFailure::ListFailed(_)))
        ));
        assert_eq!(report.outcome_for(BUCKET), Some(&ClearOutcome::Cleared(3)));
        // The match entry still pins the selector group.
        assert!(report.outcome_for(SEL).is_some_and(ClearOutcome::is_failed));
        assert_eq!(report.failures().count(), 3);
    }

    #[tokio::test]
    async fn test_default_action_reset() {
        let sim = pipeline();
        sim.set_current_default(LB, ActionSpec::new("fwd"));
        let rec = reconciler(&sim, true);

        let report = rec.clear_all().await.unwrap();
        assert!(report.get(LB).unwrap().default_reset.is_reset());
        assert_eq!(sim.current_default(LB), Some(ActionSpec::new("drop")));
        assert!(!report.get(SEL).unwrap().default_reset.is_reset());
        assert!(!report.get(BUCKET).unwrap().default_reset.is_reset());
        assert!(!report.has_failures());
    }

    #[tokio::test]
    async fn test_default_reset_runs_after_failed_removal() {
        let sim = pipeline();
        sim.fail_remove(BUCKET, bucket_key(0), BfrtStatus::HwUpdateFailed);
        let rec = reconciler(&sim, true);

        rec.clear(&object(&sim, BUCKET)).await.unwrap();
        assert_eq!(
            sim.calls().last(),
            Some(&SessionCall::ResetDefault(BUCKET.to_string()))
        );
    }

    #[tokio::test]
    async fn test_default_reset_failure_leaves_outcome_alone() {
        let sim = pipeline();
        sim.fail_reset_default(CLIENT, BfrtStatus::TableLocked);
        sim.set_current_default(CLIENT, ActionSpec::new("fwd"));
        let rec = reconciler(&sim, true);

        let report = rec.clear_all().await.unwrap();
        let client = report.get(CLIENT).unwrap();
        assert_eq!(client.outcome, ClearOutcome::AlreadyEmpty);
        match &client.default_reset {
            DefaultReset::Unsupported(e) => {
                assert_eq!(e.status_code(), Some(BfrtStatus::TableLocked))
            }
            other => panic!("unexpected reset {:?}", other),
        }
        assert_eq!(sim.current_default(CLIENT), Some(ActionSpec::new("fwd")));
        assert_eq!(report.outcome_for(BUCKET), Some(&ClearOutcome::Cleared(3)));
        assert!(!report.has_failures());
    }

    #[tokio::test]
    async fn test_transport_failure_aborts_run() {
        let sim = pipeline();
        let rec = reconciler(&sim, true);
        let bucket = object(&sim, BUCKET);
        sim.disconnect();

        let err = rec.clear(&bucket).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Transport { ref object, .. } if object == BUCKET));
        assert!(rec.clear_all().await.is_err());
    }

    #[tokio::test]
    async fn test_progress_lines() {
        let sim = pipeline();
        let rec = reconciler(&sim, true);

        let report = rec.clear_all().await.unwrap();
        let lines = report.lines();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("Clearing table pipe.Ingress.lb "));
        assert!(lines[1].ends_with("... empty"));
        assert!(lines[2].ends_with("... cleared (3 entries)"));
    }

    #[tokio::test]
    async fn test_clear_group_appends_to_report() {
        let sim = pipeline();
        let rec = reconciler(&sim, true);
        let mut report = ReconcileReport::new();

        rec.clear_group(&ordered_kind_groups()[0], &mut report)
            .await
            .unwrap();
        assert_eq!(report.len(), 3);
        assert!(report.objects().iter().all(|r| r.group == "match tables"));
        assert_eq!(sim.entry_count(SEL), 1);
    }
}
