//! Deterministic batch plan enumeration.
//!
//! A plan is the full, ordered list of [`PlanItem`]s a batch run works
//! through. The 1-based position of an item is its sequence number, and the
//! sequence number is part of the item's checkpoint filename.
//!
//! # Compatibility
//!
//! Adding, removing or reordering any tier, topic or cross combo shifts the
//! sequence number of every later item. Existing artifacts are never
//! renamed, so after such an edit a `--resume` run treats the shifted items
//! as missing and the old files as unrelated. Append new entries at the end
//! of the cross-combo list when an output directory must stay resumable.

use std::collections::HashMap;

use crate::models::PlanItem;

/// One priority tier: every topic × dimension × difficulty combination,
/// each repeated `repeat` times.
#[derive(Debug)]
pub struct Tier {
    pub topics: &'static [&'static str],
    pub dimensions: &'static [&'static str],
    pub difficulties: &'static [&'static str],
    pub repeat: usize,
}

/// Static weighted tables a plan is expanded from.
#[derive(Debug)]
pub struct PlanTables {
    pub tiers: &'static [Tier],
    /// Explicit `(hint, dimension, difficulty)` combinations.
    pub cross: &'static [(&'static str, &'static str, &'static str)],
    pub cross_repeat: usize,
}

impl PlanTables {
    /// Number of items [`build_plan`] produces, without building it.
    pub fn len(&self) -> usize {
        let tiered: usize = self
            .tiers
            .iter()
            .map(|t| t.topics.len() * t.dimensions.len() * t.difficulties.len() * t.repeat)
            .sum();
        tiered + self.cross.len() * self.cross_repeat
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Expand tables into the ordered plan: tiers in order (topic, then
/// dimension, then difficulty, then repetition), followed by the cross
/// combos.
pub fn build_plan(tables: &PlanTables) -> Vec<PlanItem> {
    let mut plan = Vec::with_capacity(tables.len());
    for tier in tables.tiers {
        for topic in tier.topics {
            for dimension in tier.dimensions {
                for difficulty in tier.difficulties {
                    for _ in 0..tier.repeat {
                        plan.push(PlanItem::new(topic, dimension, difficulty));
                    }
                }
            }
        }
    }
    for (hint, dimension, difficulty) in tables.cross {
        for _ in 0..tables.cross_repeat {
            plan.push(PlanItem::new(hint, dimension, difficulty));
        }
    }
    plan
}

fn slug(s: &str) -> String {
    s.replace(' ', "_").replace('/', "-")
}

/// `0042__Deadlocks__Open__Hard.json`
pub fn exam_file_name(seq: usize, item: &PlanItem) -> String {
    format!(
        "{:04}__{}__{}__{}.json",
        seq,
        slug(&item.hint),
        item.dimension,
        item.difficulty
    )
}

/// `0042__File_Systems__Inodes__MC__Easy.json`
pub fn theory_file_name(seq: usize, item: &PlanItem) -> String {
    format!(
        "{:04}__{}__{}__MC__{}.json",
        seq,
        slug(&item.dimension),
        slug(&item.hint),
        item.difficulty
    )
}

/// Plan breakdown shown by `--dry-run`.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub total: usize,
    /// Counts per dimension, in first-seen order.
    pub by_dimension: Vec<(String, usize)>,
    /// Counts per difficulty, in first-seen order.
    pub by_difficulty: Vec<(String, usize)>,
    /// Counts per hint, largest first; ties keep first-seen order.
    pub by_hint: Vec<(String, usize)>,
}

impl Distribution {
    pub fn of(plan: &[PlanItem]) -> Self {
        let mut by_hint = count_in_order(plan.iter().map(|i| i.hint.as_str()));
        by_hint.sort_by(|a, b| b.1.cmp(&a.1));
        Self {
            total: plan.len(),
            by_dimension: count_in_order(plan.iter().map(|i| i.dimension.as_str())),
            by_difficulty: count_in_order(plan.iter().map(|i| i.difficulty.as_str())),
            by_hint,
        }
    }
}

fn count_in_order<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    for key in keys {
        match index.get(key) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(key, order.len());
                order.push((key.to_string(), 1));
            }
        }
    }
    order
}
