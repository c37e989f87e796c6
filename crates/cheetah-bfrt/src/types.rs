//! Dataplane object and entry model.
//!
//! Every addressable unit in the compiled pipeline (match table, selector,
//! action profile, register) is a [`DataplaneObject`]. Table-like objects
//! hold [`Entry`] rows; registers hold [`RegisterCell`]s.

use cheetah_types::MacAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

/// Key field naming the group id of a selector entry.
pub const SELECTOR_GROUP_ID: &str = "$SELECTOR_GROUP_ID";

/// Key field naming the member id of an action-profile entry.
pub const ACTION_MEMBER_ID: &str = "$ACTION_MEMBER_ID";

/// Data field of a direct byte counter.
pub const COUNTER_SPEC_BYTES: &str = "$COUNTER_SPEC_BYTES";

/// Data field of a direct packet counter.
pub const COUNTER_SPEC_PKTS: &str = "$COUNTER_SPEC_PKTS";

/// The declared kind of a dataplane object, as reported in the BFRuntime
/// catalog (`table_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectKind {
    MatchDirect,
    MatchIndirect,
    MatchIndirectSelector,
    Selector,
    ActionProfile,
    Register,
    Counter,
    Meter,
    /// Any catalog type the control plane does not act on.
    #[serde(other)]
    Other,
}

impl ObjectKind {
    /// Returns the BFRuntime `table_type` spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::MatchDirect => "MATCH_DIRECT",
            ObjectKind::MatchIndirect => "MATCH_INDIRECT",
            ObjectKind::MatchIndirectSelector => "MATCH_INDIRECT_SELECTOR",
            ObjectKind::Selector => "SELECTOR",
            ObjectKind::ActionProfile => "ACTION_PROFILE",
            ObjectKind::Register => "REGISTER",
            ObjectKind::Counter => "COUNTER",
            ObjectKind::Meter => "METER",
            ObjectKind::Other => "OTHER",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One addressable unit in the pipeline.
///
/// Re-fetched from the catalog on every run; never cached across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataplaneObject {
    /// Name unique within the pipeline (e.g. `pipe.Ingress.get_client`).
    pub name: String,
    /// Qualified display name.
    pub full_name: String,
    /// Declared kind.
    pub kind: ObjectKind,
}

impl DataplaneObject {
    /// Creates an object whose display name is its name.
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        let name = name.into();
        Self {
            full_name: name.clone(),
            name,
            kind,
        }
    }
}

/// A typed key field or action parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(u64),
    Ipv4(Ipv4Addr),
    Mac(MacAddress),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Ipv4(ip) => write!(f, "{}", ip),
            FieldValue::Mac(mac) => write!(f, "{}", mac),
        }
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Int(u64::from(v))
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        FieldValue::Int(u64::from(v))
    }
}

impl From<Ipv4Addr> for FieldValue {
    fn from(ip: Ipv4Addr) -> Self {
        FieldValue::Ipv4(ip)
    }
}

impl From<MacAddress> for FieldValue {
    fn from(mac: MacAddress) -> Self {
        FieldValue::Mac(mac)
    }
}

/// Match key of an entry: named fields with exact values.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryKey(BTreeMap<String, FieldValue>);

impl EntryKey {
    /// Creates an empty key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field to the key.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Returns the value of a key field.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    /// Iterates over the key fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// An action name bound to its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, FieldValue>,
}

impl ActionSpec {
    /// Creates an action with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Adds a parameter.
    pub fn with_param(mut self, param: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.params.insert(param.into(), value.into());
        self
    }
}

impl fmt::Display for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{}({})", self.name, parts.join(", "))
    }
}

/// A reference from one entry to an entry in another object, such as a
/// match entry pointing at a selector group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryRef {
    pub object: String,
    pub key: EntryKey,
}

impl EntryRef {
    /// Reference to a selector group.
    pub fn selector_group(selector: impl Into<String>, group_id: u32) -> Self {
        Self {
            object: selector.into(),
            key: EntryKey::new().with(SELECTOR_GROUP_ID, group_id),
        }
    }

    /// Reference to an action-profile member.
    pub fn profile_member(profile: impl Into<String>, member_id: u32) -> Self {
        Self {
            object: profile.into(),
            key: EntryKey::new().with(ACTION_MEMBER_ID, member_id),
        }
    }
}

/// Direct counter attached to a match entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectCounter {
    pub bytes: u64,
    pub packets: u64,
}

impl DirectCounter {
    /// Returns true if both counters are zero.
    pub fn is_zero(&self) -> bool {
        self.bytes == 0 && self.packets == 0
    }
}

/// One row of a table-like object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: EntryKey,
    #[serde(default)]
    pub action: Option<ActionSpec>,
    /// Entries in other objects this row depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<EntryRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<DirectCounter>,
}

impl Entry {
    /// Creates an entry bound to an action.
    pub fn new(key: EntryKey, action: ActionSpec) -> Self {
        Self {
            key,
            action: Some(action),
            refs: Vec::new(),
            counter: None,
        }
    }

    /// Creates an entry with no action (selector groups, for instance).
    pub fn bare(key: EntryKey) -> Self {
        Self {
            key,
            action: None,
            refs: Vec::new(),
            counter: None,
        }
    }

    /// Adds a reference to another object's entry.
    pub fn with_ref(mut self, target: EntryRef) -> Self {
        self.refs.push(target);
        self
    }

    /// Attaches a direct counter.
    pub fn with_counter(mut self, counter: DirectCounter) -> Self {
        self.counter = Some(counter);
        self
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(action) = &self.action {
            write!(f, " -> {}", action)?;
        }
        if let Some(counter) = &self.counter {
            write!(
                f,
                " [{}={} {}={}]",
                COUNTER_SPEC_BYTES, counter.bytes, COUNTER_SPEC_PKTS, counter.packets
            )?;
        }
        Ok(())
    }
}

/// One index of a register array with its named fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCell {
    pub index: u32,
    pub fields: BTreeMap<String, u64>,
}

impl fmt::Display for RegisterCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "[{}] {}", self.index, parts.join(" "))
    }
}
