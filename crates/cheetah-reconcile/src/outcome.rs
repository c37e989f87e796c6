//! Per-object clear results and the run report.

use cheetah_bfrt::{BfrtError, DataplaneObject};
use std::fmt;

use crate::error::ClearFailure;

/// Result of clearing one object.
#[derive(Debug, Clone)]
pub enum ClearOutcome {
    /// Every listed entry was removed.
    Cleared(usize),
    /// The object had nothing to clear.
    AlreadyEmpty,
    /// The object was left (partly) populated.
    Failed(ClearFailure),
}

impl ClearOutcome {
    /// Returns true if the object is known to hold no entries.
    pub fn is_clear(&self) -> bool {
        matches!(self, ClearOutcome::Cleared(_) | ClearOutcome::AlreadyEmpty)
    }

    /// Returns true for [`ClearOutcome::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, ClearOutcome::Failed(_))
    }

    /// Number of entries removed by this clear.
    pub fn removed(&self) -> usize {
        match self {
            ClearOutcome::Cleared(n) => *n,
            ClearOutcome::AlreadyEmpty => 0,
            ClearOutcome::Failed(ClearFailure::RemovalFailed { removed, .. })
            | ClearOutcome::Failed(ClearFailure::BatchEnd { removed, .. }) => *removed,
            ClearOutcome::Failed(_) => 0,
        }
    }

    /// Terminal status word shown in progress output.
    pub fn status_word(&self) -> &'static str {
        match self {
            ClearOutcome::Cleared(_) => "cleared",
            ClearOutcome::AlreadyEmpty => "empty",
            ClearOutcome::Failed(_) => "done",
        }
    }
}

impl PartialEq for ClearOutcome {
    /// Failures compare equal by variant and cause status only.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ClearOutcome::Cleared(a), ClearOutcome::Cleared(b)) => a == b,
            (ClearOutcome::AlreadyEmpty, ClearOutcome::AlreadyEmpty) => true,
            (ClearOutcome::Failed(a), ClearOutcome::Failed(b)) => {
                std::mem::discriminant(a) == std::mem::discriminant(b)
                    && a.cause().status_code() == b.cause().status_code()
            }
            _ => false,
        }
    }
}

impl fmt::Display for ClearOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearOutcome::Cleared(n) => write!(f, "cleared ({} entries)", n),
            ClearOutcome::AlreadyEmpty => write!(f, "empty"),
            ClearOutcome::Failed(failure) => write!(f, "done (failed: {})", failure),
        }
    }
}

/// What happened when the default action was reset.
#[derive(Debug, Clone)]
pub enum DefaultReset {
    Reset,
    /// The object has no resettable default (selectors, action profiles,
    /// tables without a `default_action`). Expected; never an error.
    Unsupported(BfrtError),
}

impl DefaultReset {
    pub fn is_reset(&self) -> bool {
        matches!(self, DefaultReset::Reset)
    }
}

/// Everything recorded about one visited object.
#[derive(Debug, Clone)]
pub struct ObjectReport {
    pub object: DataplaneObject,
    /// Label of the kind group the object was cleared in.
    pub group: &'static str,
    pub outcome: ClearOutcome,
    pub default_reset: DefaultReset,
}

impl ObjectReport {
    /// Human-readable progress line.
    pub fn progress_line(&self) -> String {
        format!("Clearing table {:<40} ... {}", self.object.full_name, self.outcome)
    }
}

/// Report of a full clearing run, objects in the order they were visited.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    objects: Vec<ObjectReport>,
}

impl ReconcileReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: ObjectReport) {
        self.objects.push(report);
    }

    pub fn objects(&self) -> &[ObjectReport] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Returns the report for `name`, matched on the object name.
    pub fn get(&self, name: &str) -> Option<&ObjectReport> {
        self.objects.iter().find(|r| r.object.name == name)
    }

    /// Returns the outcome for `name`, if the object was visited.
    pub fn outcome_for(&self, name: &str) -> Option<&ClearOutcome> {
        self.get(name).map(|r| &r.outcome)
    }

    /// Returns true if `name` was visited and is known to be empty.
    pub fn is_cleared(&self, name: &str) -> bool {
        self.outcome_for(name).is_some_and(ClearOutcome::is_clear)
    }

    /// Objects whose clear failed.
    pub fn failures(&self) -> impl Iterator<Item = &ObjectReport> {
        self.objects.iter().filter(|r| r.outcome.is_failed())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Total entries removed across all objects.
    pub fn total_removed(&self) -> usize {
        self.objects.iter().map(|r| r.outcome.removed()).sum()
    }

    /// Progress lines for every visited object.
    pub fn lines(&self) -> Vec<String> {
        self.objects.iter().map(ObjectReport::progress_line).collect()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cleared = self
            .objects
            .iter()
            .filter(|r| matches!(r.outcome, ClearOutcome::Cleared(_)))
            .count();
        let empty = self
            .objects
            .iter()
            .filter(|r| matches!(r.outcome, ClearOutcome::AlreadyEmpty))
            .count();
        write!(
            f,
            "{} objects: {} cleared, {} empty, {} failed, {} entries removed",
            self.objects.len(),
            cleared,
            empty,
            self.failures().count(),
            self.total_removed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cheetah_bfrt::ObjectKind;
    use pretty_assertions::assert_eq;

    fn report(name: &str, outcome: ClearOutcome) -> ObjectReport {
        ObjectReport {
            object: DataplaneObject::new(name, ObjectKind::MatchDirect),
            group: "match tables",
            outcome,
            default_reset: DefaultReset::Reset,
        }
    }

    #[test]
    fn test_progress_line() {
        let r = report("pipe.Ingress.get_client", ClearOutcome::Cleared(2));
        assert_eq!(
            r.progress_line(),
            "Clearing table pipe.Ingress.get_client                  ... cleared (2 entries)"
        );
        let r = report("pipe.Ingress.get_client", ClearOutcome::AlreadyEmpty);
        assert!(r.progress_line().ends_with("... empty"));
    }

    #[test]
    fn test_status_words() {
        assert_eq!(ClearOutcome::Cleared(1).status_word(), "cleared");
        assert_eq!(ClearOutcome::AlreadyEmpty.status_word(), "empty");
        let failed = ClearOutcome::Failed(ClearFailure::ListFailed(BfrtError::transport("x")));
        assert_eq!(failed.status_word(), "done");
        assert!(failed.to_string().starts_with("done (failed: listing entries failed"));
    }

    #[test]
    fn test_report_summary() {
        let mut rep = ReconcileReport::new();
        rep.push(report("a", ClearOutcome::Cleared(3)));
        rep.push(report("b", ClearOutcome::AlreadyEmpty));
        rep.push(report(
            "c",
            ClearOutcome::Failed(ClearFailure::RemovalFailed {
                removed: 1,
                failed: 1,
                first_cause: BfrtError::in_use("c"),
            }),
        ));

        assert!(rep.is_cleared("a"));
        assert!(rep.is_cleared("b"));
        assert!(!rep.is_cleared("c"));
        assert!(!rep.is_cleared("missing"));
        assert!(rep.has_failures());
        assert_eq!(rep.total_removed(), 4);
        assert_eq!(
            rep.to_string(),
            "3 objects: 1 cleared, 1 empty, 1 failed, 4 entries removed"
        );
    }

    #[test]
    fn test_outcome_equality_ignores_context() {
        let a = ClearOutcome::Failed(ClearFailure::ListFailed(BfrtError::in_use("x")));
        let b = ClearOutcome::Failed(ClearFailure::ListFailed(BfrtError::in_use("y")));
        assert_eq!(a, b);
        assert_ne!(a, ClearOutcome::AlreadyEmpty);
    }
}
