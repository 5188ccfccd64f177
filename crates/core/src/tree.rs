//! Capability reference tree.
//!
//! Loaded once per session from `GET /api/capability-tree` and never
//! mutated by the client. A control may appear under several capabilities;
//! the tree keeps each capability's own copy of the `ControlRef`.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Whether a capability is a technical safeguard or a procedural one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CapabilityType {
    Technical,
    NonTechnical,
    /// Anything the data service sends that we don't recognize (kept verbatim)
    Other(String),
}

impl From<String> for CapabilityType {
    fn from(raw: String) -> Self {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "technical" => CapabilityType::Technical,
            "nontechnical" => CapabilityType::NonTechnical,
            _ => CapabilityType::Other(raw),
        }
    }
}

impl From<CapabilityType> for String {
    fn from(t: CapabilityType) -> Self {
        match t {
            CapabilityType::Technical => "technical".to_string(),
            CapabilityType::NonTechnical => "non-technical".to_string(),
            CapabilityType::Other(raw) => raw,
        }
    }
}

impl Default for CapabilityType {
    fn default() -> Self {
        CapabilityType::Other(String::new())
    }
}

/// A control as listed under a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRef {
    pub control_id: String,
    #[serde(default)]
    pub control_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_domain: Option<String>,
}

impl ControlRef {
    pub fn new(control_id: impl Into<String>, control_title: impl Into<String>) -> Self {
        Self {
            control_id: control_id.into(),
            control_title: control_title.into(),
            control_domain: None,
        }
    }
}

/// A risk reachable through one of the capability's controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRef {
    pub risk_id: String,
    #[serde(default)]
    pub risk_title: String,
}

/// A named defensive function grouping one or more controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Missing or blank ids are tolerated on load but rejected by toggles.
    #[serde(default)]
    pub capability_id: Option<String>,
    #[serde(default)]
    pub capability_name: String,
    #[serde(default)]
    pub capability_type: CapabilityType,
    #[serde(default)]
    pub capability_domain: String,
    #[serde(default)]
    pub capability_definition: String,
    #[serde(default)]
    pub controls: Vec<ControlRef>,
    #[serde(default)]
    pub risks: Vec<RiskRef>,
}

impl Capability {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            capability_id: Some(id.into()),
            capability_name: name.into(),
            capability_type: CapabilityType::Technical,
            capability_domain: String::new(),
            capability_definition: String::new(),
            controls: Vec::new(),
            risks: Vec::new(),
        }
    }

    /// Builder helper, mostly for fixtures.
    pub fn with_controls<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.controls = ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                ControlRef::new(id.clone(), id)
            })
            .collect();
        self
    }

    /// The capability id, or `None` when it is missing or blank.
    pub fn id(&self) -> Option<&str> {
        self.capability_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Control ids listed under this capability, blanks skipped.
    pub fn control_ids(&self) -> impl Iterator<Item = &str> {
        self.controls
            .iter()
            .map(|c| c.control_id.trim())
            .filter(|id| !id.is_empty())
    }

    pub fn contains_control(&self, control_id: &str) -> bool {
        self.control_ids().any(|id| id == control_id)
    }
}

/// Indexed view over the capability list.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTree {
    capabilities: Vec<Capability>,
    by_id: HashMap<String, usize>,
}

impl CapabilityTree {
    pub fn new(capabilities: Vec<Capability>) -> Self {
        let mut by_id = HashMap::with_capacity(capabilities.len());
        for (idx, cap) in capabilities.iter().enumerate() {
            if let Some(id) = cap.id() {
                // First occurrence wins
                by_id.entry(id.to_string()).or_insert(idx);
            }
        }
        Self { capabilities, by_id }
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn get(&self, capability_id: &str) -> Option<&Capability> {
        self.by_id
            .get(capability_id)
            .map(|&idx| &self.capabilities[idx])
    }

    pub fn contains(&self, capability_id: &str) -> bool {
        self.by_id.contains_key(capability_id)
    }

    /// Number of addressable capabilities (those with an id).
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Capability ids in tree order, each reported once.
    pub fn capability_ids(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.capabilities
            .iter()
            .filter_map(Capability::id)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Every control id reachable from any addressable capability.
    pub fn all_control_ids(&self) -> BTreeSet<String> {
        self.capabilities
            .iter()
            .filter(|cap| cap.id().is_some())
            .flat_map(|cap| cap.control_ids())
            .map(String::from)
            .collect()
    }

    /// Capabilities listing `control_id`, in tree order.
    pub fn capabilities_containing(&self, control_id: &str) -> Vec<&Capability> {
        self.capabilities
            .iter()
            .filter(|cap| cap.id().is_some() && cap.contains_control(control_id))
            .collect()
    }
}

/// Response of `GET /api/capability-unique-controls`.
///
/// A control is "unique" to a capability when no other capability lists it,
/// so switching that capability off really removes the control.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniqueControls {
    pub capabilities_with_unique_controls: Vec<String>,
    pub unique_control_counts: HashMap<String, usize>,
    pub unique_control_ids: HashMap<String, Vec<String>>,
}

impl UniqueControls {
    pub fn has_unique(&self, capability_id: &str) -> bool {
        self.capabilities_with_unique_controls
            .iter()
            .any(|id| id == capability_id)
    }

    pub fn unique_count(&self, capability_id: &str) -> usize {
        self.unique_control_counts
            .get(capability_id)
            .copied()
            .or_else(|| self.unique_control_ids.get(capability_id).map(Vec::len))
            .unwrap_or(0)
    }

    pub fn unique_ids(&self, capability_id: &str) -> &[String] {
        self.unique_control_ids
            .get(capability_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// How many currently active controls would go away if this capability
    /// were switched off.
    pub fn removal_impact(&self, capability_id: &str, active_controls: &BTreeSet<String>) -> usize {
        self.unique_ids(capability_id)
            .iter()
            .filter(|id| active_controls.contains(id.as_str()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> CapabilityTree {
        CapabilityTree::new(vec![
            Capability::new("CAP-1", "Logging").with_controls(["C-1", "C-2"]),
            Capability::new("CAP-2", "Monitoring").with_controls(["C-2", "C-3"]),
            Capability::new("CAP-3", "Policy"),
        ])
    }

    #[test]
    fn test_capability_type_is_lenient() {
        let cases = [
            ("Technical", CapabilityType::Technical),
            ("technical", CapabilityType::Technical),
            ("Non-Technical", CapabilityType::NonTechnical),
            ("non_technical", CapabilityType::NonTechnical),
        ];
        for (raw, expected) in cases {
            assert_eq!(CapabilityType::from(raw.to_string()), expected, "{}", raw);
        }
        assert_eq!(
            CapabilityType::from("Hybrid".to_string()),
            CapabilityType::Other("Hybrid".into())
        );
    }

    #[test]
    fn test_capability_deserializes_from_tree_payload() {
        let json = r#"{
            "capability_id": "CAP-9",
            "capability_name": "Encryption",
            "capability_type": "Technical",
            "capability_domain": "Data",
            "capability_definition": "Protects data at rest",
            "candidate_products": "ignored",
            "controls": [{"control_id": "C-9", "control_title": "Encrypt disks", "control_domain": "Protect"}],
            "risks": [{"risk_id": "R-1", "risk_title": "Data leak"}]
        }"#;
        let cap: Capability = serde_json::from_str(json).unwrap();
        assert_eq!(cap.id(), Some("CAP-9"));
        assert_eq!(cap.capability_type, CapabilityType::Technical);
        assert_eq!(cap.controls[0].control_domain.as_deref(), Some("Protect"));
        assert_eq!(cap.risks[0].risk_id, "R-1");
    }

    #[test]
    fn test_missing_and_blank_ids() {
        let cap: Capability = serde_json::from_str(r#"{"capability_name": "Orphan"}"#).unwrap();
        assert_eq!(cap.id(), None);

        let blank = Capability::new("  ", "Blank");
        assert_eq!(blank.id(), None);

        let tree = CapabilityTree::new(vec![blank, Capability::new("CAP-1", "Real")]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.capabilities().len(), 2);
    }

    #[test]
    fn test_lookup_and_shared_controls() {
        let tree = sample_tree();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.get("CAP-2").unwrap().capability_name, "Monitoring");
        assert!(tree.get("CAP-404").is_none());

        let owners: Vec<_> = tree
            .capabilities_containing("C-2")
            .iter()
            .filter_map(|c| c.id())
            .collect();
        assert_eq!(owners, vec!["CAP-1", "CAP-2"]);

        let all: Vec<_> = tree.all_control_ids().into_iter().collect();
        assert_eq!(all, vec!["C-1", "C-2", "C-3"]);
    }

    #[test]
    fn test_duplicate_capability_ids_reported_once() {
        let tree = CapabilityTree::new(vec![
            Capability::new("CAP-1", "First").with_controls(["C-1"]),
            Capability::new("CAP-1", "Second").with_controls(["C-2"]),
        ]);
        assert_eq!(tree.capability_ids(), vec!["CAP-1"]);
        assert_eq!(tree.get("CAP-1").unwrap().capability_name, "First");
    }

    #[test]
    fn test_unique_controls_removal_impact() {
        let json = r#"{
            "capabilities_with_unique_controls": ["CAP-1"],
            "count": 1,
            "unique_control_counts": {"CAP-1": 2},
            "unique_control_ids": {"CAP-1": ["C-1", "C-4"]}
        }"#;
        let unique: UniqueControls = serde_json::from_str(json).unwrap();
        assert!(unique.has_unique("CAP-1"));
        assert!(!unique.has_unique("CAP-2"));
        assert_eq!(unique.unique_count("CAP-1"), 2);
        assert_eq!(unique.unique_count("CAP-2"), 0);

        let active: BTreeSet<String> = ["C-1", "C-2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique.removal_impact("CAP-1", &active), 1);
        assert_eq!(unique.removal_impact("CAP-2", &active), 0);
    }
}
