//! Subscription, trigger and proposal records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::ConstructKind;
use crate::repo::Hunk;

/// Version of the fingerprinting scheme stored with every semantic target.
pub const FINGERPRINT_VERSION: u32 = 1;

/// Why a trigger fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Content,
    Structural,
    Missing,
    Ambiguous,
    ParseError,
    Aggregate,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Content => "CONTENT",
            ChangeType::Structural => "STRUCTURAL",
            ChangeType::Missing => "MISSING",
            ChangeType::Ambiguous => "AMBIGUOUS",
            ChangeType::ParseError => "PARSE_ERROR",
            ChangeType::Aggregate => "AGGREGATE",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome for a member present at both revisions. Missing and added
/// members are listed by id in [`ContainerChanges`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberChangeType {
    Content,
    Structural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

/// Snapshot of one container member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFingerprint {
    pub kind: ConstructKind,
    pub interface_hash: String,
    pub body_hash: String,
}

/// Relative member id -> fingerprint.
pub type BaselineMembers = BTreeMap<String, MemberFingerprint>;

/// Stored identity of a construct subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticTarget {
    pub language: String,
    pub kind: ConstructKind,
    pub qualname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub interface_hash: String,
    pub body_hash: String,
    #[serde(default = "default_fingerprint_version")]
    pub fingerprint_version: u32,
    #[serde(default)]
    pub include_members: bool,
    #[serde(default)]
    pub include_private: bool,
    #[serde(default)]
    pub track_decorators: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub baseline_members: BaselineMembers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_container_qualname: Option<String>,
}

fn default_fingerprint_version() -> u32 {
    FINGERPRINT_VERSION
}

fn default_active() -> bool {
    true
}

/// A watched line range, optionally bound to a named construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    /// `None` for line-based subscriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SemanticTarget>,
}

impl Subscription {
    pub fn is_semantic(&self) -> bool {
        self.semantic.is_some()
    }
}

/// A construct offered as a possible match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub path: String,
    pub qualname: String,
    pub kind: ConstructKind,
    pub start_line: usize,
    pub end_line: usize,
}

impl From<&crate::analysis::Construct> for Candidate {
    fn from(c: &crate::analysis::Construct) -> Self {
        Self {
            path: c.path.clone(),
            qualname: c.qualname.clone(),
            kind: c.kind,
            start_line: c.start_line,
            end_line: c.end_line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberChange {
    pub id: String,
    pub change_type: MemberChangeType,
}

/// Member-level diff of a container against its baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerChanges {
    pub renamed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_qualname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_qualname: Option<String>,
    pub interface_changed: bool,
    pub members_added: Vec<String>,
    pub members_removed: Vec<String>,
    /// CONTENT or STRUCTURAL member entries.
    pub members_changed: Vec<MemberChange>,
}

impl ContainerChanges {
    pub fn is_empty(&self) -> bool {
        !self.renamed
            && !self.interface_changed
            && self.members_added.is_empty()
            && self.members_removed.is_empty()
            && self.members_changed.is_empty()
    }

    /// Summary tags, one per non-empty change category.
    pub fn reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.renamed {
            reasons.push("container_renamed");
        }
        if self.interface_changed {
            reasons.push("container_interface_changed");
        }
        if !self.members_added.is_empty() {
            reasons.push("members_added");
        }
        if !self.members_removed.is_empty() {
            reasons.push("members_removed");
        }
        if !self.members_changed.is_empty() {
            reasons.push("members_changed");
        }
        reasons.into_iter().map(str::to_string).collect()
    }
}

/// A changed ancestor member that reaches the subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritedChange {
    pub origin_path: String,
    pub origin_class: String,
    /// Relative member id within `origin_class`.
    pub member: String,
    pub change_type: ChangeType,
    /// Classes between the subscriber and the origin, nearest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub via: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDetails {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_changes: Option<ContainerChanges>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherited_changes: Vec<InheritedChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

/// "This subscription needs attention."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub subscription_id: String,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub reasons: Vec<String>,
    pub change_type: ChangeType,
    #[serde(default)]
    pub details: TriggerDetails,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matching_hunks: Vec<Hunk>,
}

/// "Here is where this moved to."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub subscription_id: String,
    pub old_path: String,
    pub old_start: usize,
    pub old_end: usize,
    pub new_path: String,
    pub new_start: usize,
    pub new_end: usize,
    pub reasons: Vec<String>,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_qualname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_kind: Option<ConstructKind>,
}

/// Evaluation of one subscription: two independent optional parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub trigger: Option<Trigger>,
    pub proposal: Option<Proposal>,
}

impl Outcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn is_unchanged(&self) -> bool {
        self.trigger.is_none() && self.proposal.is_none()
    }
}

/// A per-subscription repository failure; the scan continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanIssue {
    pub subscription_id: String,
    pub message: String,
}

/// Everything one scan produced for a (base, target) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub base_ref: String,
    pub target_ref: String,
    pub base_revision: String,
    pub target_revision: String,
    pub triggers: Vec<Trigger>,
    pub proposals: Vec<Proposal>,
    pub unchanged: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ScanIssue>,
}

impl ScanResult {
    pub fn has_triggers(&self) -> bool {
        !self.triggers.is_empty()
    }

    pub fn trigger_for(&self, subscription_id: &str) -> Option<&Trigger> {
        self.triggers
            .iter()
            .find(|t| t.subscription_id == subscription_id)
    }

    pub fn proposal_for(&self, subscription_id: &str) -> Option<&Proposal> {
        self.proposals
            .iter()
            .find(|p| p.subscription_id == subscription_id)
    }

    pub fn push(&mut self, subscription_id: &str, outcome: Outcome) {
        if outcome.is_unchanged() {
            self.unchanged.push(subscription_id.to_string());
            return;
        }
        if let Some(trigger) = outcome.trigger {
            self.triggers.push(trigger);
        }
        if let Some(proposal) = outcome.proposal {
            self.proposals.push(proposal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_type_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&ChangeType::ParseError).unwrap(),
            "\"PARSE_ERROR\""
        );
        assert_eq!(ChangeType::Aggregate.to_string(), "AGGREGATE");
        assert_eq!(serde_json::to_string(&Confidence::Medium).unwrap(), "\"medium\"");
    }

    #[test]
    fn test_member_change_covers_shared_members_only() {
        assert_eq!(
            serde_json::to_string(&MemberChangeType::Structural).unwrap(),
            "\"STRUCTURAL\""
        );
        // added and removed members live in the id lists
        assert!(serde_json::from_str::<MemberChangeType>("\"ADDED\"").is_err());
        assert!(serde_json::from_str::<MemberChangeType>("\"MISSING\"").is_err());
    }

    #[test]
    fn test_container_reasons_follow_categories() {
        let changes = ContainerChanges {
            renamed: true,
            members_added: vec!["age".to_string()],
            ..Default::default()
        };
        assert!(!changes.is_empty());
        assert_eq!(changes.reasons(), vec!["container_renamed", "members_added"]);
        assert!(ContainerChanges::default().is_empty());
    }

    #[test]
    fn test_subscription_defaults_from_yaml() {
        let sub: Subscription =
            serde_yaml::from_str("id: s1\npath: a.py\nstart_line: 1\nend_line: 3\n").unwrap();
        assert!(sub.active);
        assert!(!sub.is_semantic());
    }

    #[test]
    fn test_push_routes_outcomes() {
        let mut result = ScanResult::default();
        result.push("a", Outcome::unchanged());
        assert_eq!(result.unchanged, vec!["a"]);
        assert!(!result.has_triggers());
    }
}
