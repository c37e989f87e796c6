//! Clearing precedence over object kinds.
//!
//! References flow from match entries to selector groups to action-profile
//! members. Removing a referenced object first makes the device reject the
//! removal with `BF_IN_USE`, so groups are cleared strictly in the order
//! below. Objects inside one group do not reference each other.

use cheetah_bfrt::ObjectKind;

/// A set of object kinds cleared together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindGroup {
    /// Short label used in logs and reports.
    pub name: &'static str,
    /// Kinds belonging to this group.
    pub kinds: &'static [ObjectKind],
}

impl KindGroup {
    /// Returns true if `kind` belongs to this group.
    pub fn contains(&self, kind: ObjectKind) -> bool {
        self.kinds.contains(&kind)
    }
}

const CLEAR_ORDER: [KindGroup; 3] = [
    KindGroup {
        name: "match tables",
        kinds: &[ObjectKind::MatchDirect, ObjectKind::MatchIndirectSelector],
    },
    KindGroup {
        name: "selectors",
        kinds: &[ObjectKind::Selector],
    },
    KindGroup {
        name: "action profiles",
        kinds: &[ObjectKind::ActionProfile],
    },
];

/// Returns the kind groups in strict application order.
pub fn ordered_kind_groups() -> &'static [KindGroup] {
    &CLEAR_ORDER
}

/// Returns the position of `kind` in the clearing order, or `None` for
/// kinds that are never cleared (registers, counters, ...).
pub fn rank(kind: ObjectKind) -> Option<usize> {
    CLEAR_ORDER.iter().position(|group| group.contains(kind))
}
