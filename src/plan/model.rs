use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority at or above this value marks security or replacement urgency.
pub const URGENT_PRIORITY: i64 = 1000;

/// A single proposed package version change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanItem {
    pub name: String,
    pub current_version: String,
    pub target_version: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub fixes_vulnerabilities: bool,
    #[serde(default)]
    pub vulnerability_count: u32,
}

impl PlanItem {
    pub fn new(
        name: impl Into<String>,
        current_version: impl Into<String>,
        target_version: impl Into<String>,
        priority: i64,
    ) -> Self {
        Self {
            name: name.into(),
            current_version: current_version.into(),
            target_version: target_version.into(),
            priority,
            reason: String::new(),
            fixes_vulnerabilities: false,
            vulnerability_count: 0,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    #[cfg(test)]
    pub fn with_vulnerabilities(mut self, count: u32) -> Self {
        self.fixes_vulnerabilities = count > 0;
        self.vulnerability_count = count;
        self
    }

    pub fn is_urgent(&self) -> bool {
        self.priority >= URGENT_PRIORITY
    }
}

/// Fixed priority assigned to a batch based on the category of its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityTier {
    MinorPatch,
    Major,
    Replacement,
}

impl PriorityTier {
    pub fn value(self) -> i64 {
        match self {
            PriorityTier::Replacement => 1000,
            PriorityTier::Major => 500,
            PriorityTier::MinorPatch => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PriorityTier::Replacement => "replacement",
            PriorityTier::Major => "major",
            PriorityTier::MinorPatch => "minor",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.value())
    }
}

/// Ordinal risk estimate for a batch. Ordering is `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(label)
    }
}

/// An ordered group of plan items applied and installed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBatch {
    pub id: String,
    pub items: Vec<PlanItem>,
    pub tier: PriorityTier,
    pub risk: RiskLevel,
}

impl UpdateBatch {
    pub fn priority(&self) -> i64 {
        self.tier.value()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.name.as_str())
    }

    /// Build the consolidated batch used after individual fallback, keeping
    /// only `names` in their original order.
    pub fn retain_packages(&self, names: &[String]) -> UpdateBatch {
        let items: Vec<PlanItem> = self
            .items
            .iter()
            .filter(|item| names.contains(&item.name))
            .cloned()
            .collect();

        UpdateBatch {
            id: format!("{}-partial", self.id),
            items,
            tier: self.tier,
            risk: self.risk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_item_reads_camel_case_json() {
        let json = r#"{
            "name": "lodash",
            "currentVersion": "^4.17.15",
            "targetVersion": "4.17.21",
            "priority": 1000,
            "reason": "CVE-2021-23337",
            "fixesVulnerabilities": true,
            "vulnerabilityCount": 2
        }"#;

        let item: PlanItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.name, "lodash");
        assert!(item.is_urgent());
        assert!(item.fixes_vulnerabilities);
        assert_eq!(item.vulnerability_count, 2);
    }

    #[test]
    fn plan_item_defaults_optional_fields() {
        let json = r#"{"name":"chalk","currentVersion":"4.1.0","targetVersion":"4.1.2"}"#;
        let item: PlanItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.priority, 0);
        assert!(!item.fixes_vulnerabilities);
        assert!(item.reason.is_empty());
    }

    #[test]
    fn plan_item_accepts_negative_priority() {
        let json = r#"{"name":"left-pad","currentVersion":"1.0.0","targetVersion":"1.3.0","priority":-5}"#;
        let item: PlanItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.priority, -5);
        assert!(!item.is_urgent());
    }

    #[test]
    fn risk_levels_are_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }

    #[test]
    fn retain_packages_keeps_original_order() {
        let batch = UpdateBatch {
            id: "minor-1".into(),
            items: vec![
                PlanItem::new("a", "1.0.0", "1.1.0", 100),
                PlanItem::new("b", "1.0.0", "1.1.0", 100),
                PlanItem::new("c", "1.0.0", "1.1.0", 100),
            ],
            tier: PriorityTier::MinorPatch,
            risk: RiskLevel::Low,
        };

        let partial = batch.retain_packages(&["c".to_string(), "a".to_string()]);
        let names: Vec<&str> = partial.package_names().collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(partial.id, "minor-1-partial");
    }
}
