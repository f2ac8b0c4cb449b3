use crate::plan::model::{PlanItem, PriorityTier, RiskLevel, UpdateBatch};
use crate::plan::version::is_major_update;
use std::cmp::Reverse;
use tracing::debug;

pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;

/// Batches at or below this size are considered small when estimating risk.
const SMALL_BATCH_SIZE: usize = 5;

/// Groups plan items into prioritised, size-bounded batches.
#[derive(Debug, Clone)]
pub struct BatchPlanner {
    max_batch_size: usize,
}

impl Default for BatchPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_SIZE)
    }
}

impl BatchPlanner {
    /// A `max_batch_size` of zero is clamped to one.
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
        }
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Partition `items` into replacement, major and minor/patch categories and
    /// batch each one. Major bumps always get a batch of their own.
    ///
    /// Package names are not deduplicated here.
    pub fn create_batches(&self, items: &[PlanItem]) -> Vec<UpdateBatch> {
        let mut replacements = Vec::new();
        let mut majors = Vec::new();
        let mut minors = Vec::new();

        for item in items {
            match Self::categorize(item) {
                PriorityTier::Replacement => replacements.push(item.clone()),
                PriorityTier::Major => majors.push(item.clone()),
                PriorityTier::MinorPatch => minors.push(item.clone()),
            }
        }

        let mut batches = Vec::new();
        batches.extend(self.chunk(PriorityTier::Replacement, replacements, self.max_batch_size));
        batches.extend(self.chunk(PriorityTier::Major, majors, 1));
        batches.extend(self.chunk(PriorityTier::MinorPatch, minors, self.max_batch_size));

        debug!(
            items = items.len(),
            batches = batches.len(),
            "planned update batches"
        );
        batches
    }

    fn categorize(item: &PlanItem) -> PriorityTier {
        if item.is_urgent() {
            PriorityTier::Replacement
        } else if is_major_update(&item.current_version, &item.target_version) {
            PriorityTier::Major
        } else {
            PriorityTier::MinorPatch
        }
    }

    fn chunk(&self, tier: PriorityTier, items: Vec<PlanItem>, size: usize) -> Vec<UpdateBatch> {
        items
            .chunks(size)
            .enumerate()
            .map(|(index, chunk)| {
                let mut batch = UpdateBatch {
                    id: format!("{}-{}", tier.label(), index + 1),
                    items: chunk.to_vec(),
                    tier,
                    risk: RiskLevel::Low,
                };
                batch.risk = self.estimate_batch_risk(&batch);
                batch
            })
            .collect()
    }

    /// Risk estimate for a batch's contents.
    pub fn estimate_batch_risk(&self, batch: &UpdateBatch) -> RiskLevel {
        Self::risk_of(&batch.items)
    }

    fn risk_of(items: &[PlanItem]) -> RiskLevel {
        if items.is_empty() {
            return RiskLevel::Low;
        }

        if items
            .iter()
            .any(|item| is_major_update(&item.current_version, &item.target_version))
        {
            return RiskLevel::High;
        }

        let fixes_vulnerabilities = items.iter().any(|item| item.fixes_vulnerabilities);
        if fixes_vulnerabilities && items.len() > SMALL_BATCH_SIZE {
            RiskLevel::Medium
        } else if items.len() <= SMALL_BATCH_SIZE {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        }
    }

    /// Stable sort: priority descending, then risk ascending.
    pub fn reorder_for_safety(&self, mut batches: Vec<UpdateBatch>) -> Vec<UpdateBatch> {
        batches.sort_by_key(|batch| (Reverse(batch.priority()), batch.risk));
        batches
    }

    /// `create_batches` followed by `reorder_for_safety`.
    pub fn plan(&self, items: &[PlanItem]) -> Vec<UpdateBatch> {
        self.reorder_for_safety(self.create_batches(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minor(name: &str) -> PlanItem {
        PlanItem::new(name, "1.0.0", "1.1.0", 100)
    }

    fn urgent(name: &str) -> PlanItem {
        PlanItem::new(name, "1.0.0", "1.0.1", 1000)
    }

    fn major(name: &str) -> PlanItem {
        PlanItem::new(name, "^1.2.3", "2.0.0", 100)
    }

    fn batch_of(items: Vec<PlanItem>, tier: PriorityTier, risk: RiskLevel) -> UpdateBatch {
        UpdateBatch {
            id: "b".into(),
            items,
            tier,
            risk,
        }
    }

    #[test]
    fn empty_input_yields_no_batches() {
        let planner = BatchPlanner::default();
        assert!(planner.create_batches(&[]).is_empty());
    }

    #[test]
    fn single_item_yields_single_batch() {
        let planner = BatchPlanner::default();
        let batches = planner.create_batches(&[minor("left-pad")]);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0].priority(), 100);
    }

    #[test]
    fn twelve_replacements_split_ten_and_two() {
        let planner = BatchPlanner::new(10);
        let items: Vec<PlanItem> = (0..12).map(|i| urgent(&format!("pkg-{i}"))).collect();

        let batches = planner.create_batches(&items);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 10);
        assert_eq!(batches[1].len(), 2);
        assert!(batches.iter().all(|b| b.priority() == 1000));
    }

    #[test]
    fn major_bumps_are_isolated() {
        let planner = BatchPlanner::default();
        let items = vec![major("react"), major("webpack"), minor("chalk")];

        let batches = planner.create_batches(&items);

        let majors: Vec<&UpdateBatch> = batches.iter().filter(|b| b.priority() == 500).collect();
        assert_eq!(majors.len(), 2);
        assert!(majors.iter().all(|b| b.len() == 1 && b.risk == RiskLevel::High));
    }

    #[test]
    fn urgent_priority_wins_over_major_detection() {
        let planner = BatchPlanner::default();
        let item = PlanItem::new("request", "^2.88.0", "3.0.0", 1000);

        let batches = planner.create_batches(&[item]);

        assert_eq!(batches[0].tier, PriorityTier::Replacement);
    }

    #[test]
    fn negative_priority_is_batched_by_version_change() {
        let planner = BatchPlanner::default();
        let items = vec![
            PlanItem::new("left-pad", "1.0.0", "1.3.0", -5),
            PlanItem::new("moment", "^2.29.0", "3.0.0", -1),
        ];

        let batches = planner.plan(&items);

        assert_eq!(batches[0].tier, PriorityTier::Major);
        assert_eq!(batches[1].tier, PriorityTier::MinorPatch);
        assert_eq!(batches[1].items[0].priority, -5);
    }

    #[test]
    fn unparseable_versions_fall_into_minor_tier() {
        let planner = BatchPlanner::default();
        let item = PlanItem::new("internal", "workspace:*", "2.0.0", 10);

        let batches = planner.create_batches(&[item]);

        assert_eq!(batches[0].tier, PriorityTier::MinorPatch);
    }

    #[test]
    fn batch_ids_are_unique() {
        let planner = BatchPlanner::new(2);
        let items = vec![
            urgent("a"),
            urgent("b"),
            urgent("c"),
            major("d"),
            major("e"),
            minor("f"),
            minor("g"),
            minor("h"),
        ];

        let batches = planner.create_batches(&items);
        let mut ids: Vec<&str> = batches.iter().map(|b| b.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), batches.len());
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let planner = BatchPlanner::new(0);
        let batches = planner.create_batches(&[minor("a"), minor("b")]);
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn risk_of_empty_batch_is_low() {
        let planner = BatchPlanner::default();
        let batch = batch_of(vec![], PriorityTier::MinorPatch, RiskLevel::High);
        assert_eq!(planner.estimate_batch_risk(&batch), RiskLevel::Low);
    }

    #[test]
    fn risk_with_major_item_is_high_regardless_of_size() {
        let planner = BatchPlanner::default();
        let mut items: Vec<PlanItem> = (0..8).map(|i| minor(&format!("m{i}"))).collect();
        items.push(major("react"));
        let batch = batch_of(items, PriorityTier::MinorPatch, RiskLevel::Low);
        assert_eq!(planner.estimate_batch_risk(&batch), RiskLevel::High);

        let single = batch_of(vec![major("vue")], PriorityTier::Major, RiskLevel::Low);
        assert_eq!(planner.estimate_batch_risk(&single), RiskLevel::High);
    }

    #[test]
    fn risk_size_boundaries() {
        let planner = BatchPlanner::default();

        let five: Vec<PlanItem> = (0..5).map(|i| minor(&format!("p{i}"))).collect();
        let batch = batch_of(five, PriorityTier::MinorPatch, RiskLevel::High);
        assert_eq!(planner.estimate_batch_risk(&batch), RiskLevel::Low);

        let six: Vec<PlanItem> = (0..6).map(|i| minor(&format!("p{i}"))).collect();
        let batch = batch_of(six.clone(), PriorityTier::MinorPatch, RiskLevel::Low);
        assert_eq!(planner.estimate_batch_risk(&batch), RiskLevel::Medium);

        let mut vulnerable = six;
        vulnerable[0] = vulnerable[0].clone().with_vulnerabilities(3);
        let batch = batch_of(vulnerable, PriorityTier::Replacement, RiskLevel::Low);
        assert_eq!(planner.estimate_batch_risk(&batch), RiskLevel::Medium);

        let small_fix = vec![minor("x").with_vulnerabilities(1)];
        let batch = batch_of(small_fix, PriorityTier::Replacement, RiskLevel::High);
        assert_eq!(planner.estimate_batch_risk(&batch), RiskLevel::Low);
    }

    #[test]
    fn reorder_sorts_priority_then_risk_stably() {
        let planner = BatchPlanner::default();
        let mut low_minor = batch_of(vec![minor("a")], PriorityTier::MinorPatch, RiskLevel::Low);
        low_minor.id = "minor-low".into();
        let mut medium_minor =
            batch_of(vec![minor("b")], PriorityTier::MinorPatch, RiskLevel::Medium);
        medium_minor.id = "minor-medium".into();
        let mut second_low_minor =
            batch_of(vec![minor("c")], PriorityTier::MinorPatch, RiskLevel::Low);
        second_low_minor.id = "minor-low-2".into();
        let mut major_batch = batch_of(vec![major("d")], PriorityTier::Major, RiskLevel::High);
        major_batch.id = "major".into();
        let mut replacement =
            batch_of(vec![urgent("e")], PriorityTier::Replacement, RiskLevel::Medium);
        replacement.id = "replacement".into();

        let ordered = planner.reorder_for_safety(vec![
            medium_minor,
            low_minor,
            major_batch,
            second_low_minor,
            replacement,
        ]);

        let ids: Vec<&str> = ordered.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["replacement", "major", "minor-low", "minor-low-2", "minor-medium"]
        );
    }

    #[test]
    fn planned_output_never_puts_lower_priority_first() {
        let planner = BatchPlanner::new(3);
        let items = vec![
            minor("a"),
            major("b"),
            urgent("c"),
            minor("d"),
            urgent("e"),
            major("f"),
            minor("g").with_vulnerabilities(1),
        ];

        let batches = planner.plan(&items);

        for pair in batches.windows(2) {
            assert!(pair[0].priority() >= pair[1].priority());
            if pair[0].priority() == pair[1].priority() {
                assert!(pair[0].risk <= pair[1].risk);
            }
        }
        let first_non_urgent = batches.iter().position(|b| b.priority() != 1000).unwrap();
        assert!(batches[first_non_urgent..].iter().all(|b| b.priority() != 1000));
    }
}
