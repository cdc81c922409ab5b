//! Nearest-neighbor correspondence between observed clusters and aligned
//! reads, split into four disjoint quality categories.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::config::HitThresholdPolicy;
use crate::error::{AlignError, Result};
use crate::geometry::{distance, KdTree, Point};
use crate::record::HitCounts;
use crate::utils::percentile;

/// A candidate correspondence: (cluster index, in-frame read index).
pub type Hit = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitCategory {
    /// Mutual nearest neighbors with no competing pair on either side.
    Exclusive,
    /// Mutual, within threshold, and every competitor is far away.
    GoodMutual,
    BadMutual,
    /// Nearest in one direction only.
    NonMutual,
}

impl HitCategory {
    pub const ALL: [HitCategory; 4] = [
        HitCategory::Exclusive,
        HitCategory::GoodMutual,
        HitCategory::BadMutual,
        HitCategory::NonMutual,
    ];

    /// Categories pooled for least-squares fitting.
    pub const FIT_POOL: [HitCategory; 2] = [HitCategory::Exclusive, HitCategory::GoodMutual];

    pub fn name(self) -> &'static str {
        match self {
            HitCategory::Exclusive => "exclusive",
            HitCategory::GoodMutual => "good_mutual",
            HitCategory::BadMutual => "bad_mutual",
            HitCategory::NonMutual => "non_mutual",
        }
    }
}

impl fmt::Display for HitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one classification pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitClassification {
    exclusive: BTreeSet<Hit>,
    good_mutual: BTreeSet<Hit>,
    bad_mutual: BTreeSet<Hit>,
    non_mutual: BTreeSet<Hit>,
    threshold: f64,
}

impl HitClassification {
    pub fn get(&self, category: HitCategory) -> &BTreeSet<Hit> {
        match category {
            HitCategory::Exclusive => &self.exclusive,
            HitCategory::GoodMutual => &self.good_mutual,
            HitCategory::BadMutual => &self.bad_mutual,
            HitCategory::NonMutual => &self.non_mutual,
        }
    }

    /// Hits of several categories, in category then index order.
    pub fn pooled(&self, categories: &[HitCategory]) -> Vec<Hit> {
        categories
            .iter()
            .flat_map(|&category| self.get(category).iter().copied())
            .collect()
    }

    /// Category a hit was assigned to, if any.
    pub fn category_of(&self, hit: Hit) -> Option<HitCategory> {
        HitCategory::ALL
            .into_iter()
            .find(|&category| self.get(category).contains(&hit))
    }

    /// Good-hit distance threshold used for this pass, in pixels.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn counts(&self) -> HitCounts {
        HitCounts {
            exclusive: self.exclusive.len(),
            good_mutual: self.good_mutual.len(),
            bad_mutual: self.bad_mutual.len(),
            non_mutual: self.non_mutual.len(),
        }
    }

    pub fn len(&self) -> usize {
        HitCategory::ALL.iter().map(|&c| self.get(c).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verify the categories are pairwise disjoint and cover `relation`
    /// exactly.
    pub fn check_partition(&self, relation: &BTreeSet<Hit>) -> Result<()> {
        for (i, &a) in HitCategory::ALL.iter().enumerate() {
            for &b in &HitCategory::ALL[i + 1..] {
                if let Some(hit) = self.get(a).intersection(self.get(b)).next() {
                    return Err(AlignError::PartitionViolation(format!(
                        "{hit:?} is both {a} and {b}"
                    )));
                }
            }
        }

        let union: BTreeSet<Hit> = HitCategory::ALL
            .iter()
            .flat_map(|&c| self.get(c).iter().copied())
            .collect();
        if union != *relation || self.len() != relation.len() {
            return Err(AlignError::PartitionViolation(format!(
                "{} categorized hits for {} nearest-neighbor pairs",
                self.len(),
                relation.len()
            )));
        }
        Ok(())
    }
}

/// Pick the good-hit threshold from the uncapped exclusive distances.
///
/// An empty exclusive set under the percentile policy yields zero, which
/// leaves only exact coincidences as good hits.
pub fn good_hit_threshold(
    policy: HitThresholdPolicy,
    microns_per_pixel: f64,
    exclusive_distances: &[f64],
) -> f64 {
    match policy {
        HitThresholdPolicy::Fixed { pixels } => pixels,
        HitThresholdPolicy::ExclusivePercentile { percentile: pct } => {
            percentile(exclusive_distances, pct).unwrap_or(0.0)
        }
        HitThresholdPolicy::Calibrated => good_hit_threshold(
            policy.resolve(microns_per_pixel),
            microns_per_pixel,
            exclusive_distances,
        ),
    }
}

/// Classify nearest-neighbor pairs between `clusters` and `aligned`.
///
/// Both inputs must already be restricted to points inside the image. Empty
/// inputs produce an empty classification.
pub fn classify(
    clusters: &[Point],
    aligned: &[Point],
    policy: HitThresholdPolicy,
    microns_per_pixel: f64,
) -> Result<HitClassification> {
    let (cluster_tree, aligned_tree) = match (KdTree::build(clusters), KdTree::build(aligned)) {
        (Some(c), Some(a)) => (c, a),
        _ => return Ok(HitClassification::default()),
    };

    let forward: BTreeSet<Hit> = clusters
        .iter()
        .enumerate()
        .map(|(i, &p)| (i, aligned_tree.nearest(p).0))
        .collect();
    let reverse: BTreeSet<Hit> = aligned
        .iter()
        .enumerate()
        .map(|(j, &p)| (cluster_tree.nearest(p).0, j))
        .collect();

    let dist = |&(i, j): &Hit| distance(clusters[i], aligned[j]);

    let mutual: BTreeSet<Hit> = forward.intersection(&reverse).copied().collect();
    let non_mutual: BTreeSet<Hit> = forward.symmetric_difference(&reverse).copied().collect();

    let clusters_in_non_mutual: BTreeSet<usize> = non_mutual.iter().map(|&(i, _)| i).collect();
    let aligned_in_non_mutual: BTreeSet<usize> = non_mutual.iter().map(|&(_, j)| j).collect();
    let uncapped_exclusive: Vec<Hit> = mutual
        .iter()
        .filter(|(i, j)| !clusters_in_non_mutual.contains(i) && !aligned_in_non_mutual.contains(j))
        .copied()
        .collect();

    let exclusive_distances: Vec<f64> = uncapped_exclusive.iter().map(dist).collect();
    let threshold = good_hit_threshold(policy, microns_per_pixel, &exclusive_distances);
    let second_neighbor_threshold = 2.0 * threshold;

    let exclusive: BTreeSet<Hit> = uncapped_exclusive
        .into_iter()
        .filter(|hit| dist(hit) <= threshold)
        .collect();

    let good_mutual: BTreeSet<Hit> = mutual
        .difference(&exclusive)
        .filter(|hit| dist(hit) <= threshold)
        .filter(|&&(i, j)| {
            let nearest_competitor = non_mutual
                .iter()
                .filter(|&&(ci, cj)| ci == i || cj == j)
                .map(dist)
                .fold(f64::INFINITY, f64::min);
            nearest_competitor > second_neighbor_threshold
        })
        .copied()
        .collect();

    let bad_mutual: BTreeSet<Hit> = mutual
        .iter()
        .filter(|hit| !exclusive.contains(hit) && !good_mutual.contains(hit))
        .copied()
        .collect();

    let classification = HitClassification {
        exclusive,
        good_mutual,
        bad_mutual,
        non_mutual,
        threshold,
    };
    let relation: BTreeSet<Hit> = forward.union(&reverse).copied().collect();
    classification.check_partition(&relation)?;

    tracing::trace!(
        threshold,
        exclusive = classification.exclusive.len(),
        good_mutual = classification.good_mutual.len(),
        bad_mutual = classification.bad_mutual.len(),
        non_mutual = classification.non_mutual.len(),
        "Hits classified"
    );
    Ok(classification)
}
