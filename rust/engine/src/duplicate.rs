// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Duplicate suppression: the last gate before a sleeve is created.
//!
//! A point is a duplicate when an individual sleeve sits within the
//! individual tolerance of it, or when it falls in plan inside a cluster
//! opening's box grown by the cluster tolerance. The grid is keyed on
//! location points, so a large cluster can be missed by the indexed
//! lookup; a negative answer is therefore confirmed by scanning every
//! cluster.

use crate::config::SleeveConfig;
use crate::model::{HostKind, SleeveInstance, SleeveKind};
use crate::spatial::SleeveGrid;
use mep_sleeve_geometry::Point3;

/// Is there already a sleeve or cluster opening at `point`?
///
/// `host_filter` restricts the check to sleeves of one host kind.
pub fn is_duplicate(
    point: &Point3<f64>,
    individual_tolerance: f64,
    cluster_tolerance: f64,
    index: &SleeveGrid,
    host_filter: Option<HostKind>,
) -> bool {
    if indexed_duplicate(point, individual_tolerance, cluster_tolerance, index, host_filter) {
        return true;
    }

    let hit = index
        .iter()
        .filter(|sleeve| sleeve.kind() == SleeveKind::Cluster)
        .filter(|sleeve| cluster_matches(sleeve, host_filter))
        .find(|sleeve| cluster_contains(sleeve, point, cluster_tolerance));
    if let Some(cluster) = hit {
        tracing::debug!(
            cluster = %cluster.id,
            "Cluster missed by the grid lookup, caught by full scan"
        );
        return true;
    }
    false
}

fn indexed_duplicate(
    point: &Point3<f64>,
    individual_tolerance: f64,
    cluster_tolerance: f64,
    index: &SleeveGrid,
    host_filter: Option<HostKind>,
) -> bool {
    let radius = individual_tolerance.max(cluster_tolerance);
    index.nearby(point, radius).iter().any(|sleeve| match sleeve.kind() {
        SleeveKind::Individual => {
            individual_matches(sleeve, host_filter)
                && (sleeve.location - point).norm() <= individual_tolerance
        }
        SleeveKind::Cluster => {
            cluster_matches(sleeve, host_filter)
                && cluster_contains(sleeve, point, cluster_tolerance)
        }
        SleeveKind::Other => false,
    })
}

fn individual_matches(sleeve: &SleeveInstance, host_filter: Option<HostKind>) -> bool {
    host_filter.map_or(true, |kind| sleeve.family_name.ends_with(kind.family_suffix()))
}

// Clusters naming no host block every host kind
fn cluster_matches(sleeve: &SleeveInstance, host_filter: Option<HostKind>) -> bool {
    let name = &sleeve.family_name;
    let marked = HostKind::ALL.iter().any(|kind| name.contains(kind.cluster_marker()));
    host_filter.map_or(true, |kind| !marked || name.contains(kind.cluster_marker()))
}

// Plan only: cluster families carry some Z noise
fn cluster_contains(sleeve: &SleeveInstance, point: &Point3<f64>, tolerance: f64) -> bool {
    sleeve.bbox.expanded(tolerance).contains_xy(point, 0.0)
}

/// Sleeve index plus the tolerances of one placement pass.
///
/// Sleeves placed during the pass are recorded here so later segments see
/// them.
#[derive(Debug, Clone)]
pub struct DuplicateSuppressor {
    index: SleeveGrid,
    individual_tolerance: f64,
    cluster_tolerance: f64,
}

impl DuplicateSuppressor {
    pub fn new(sleeves: impl IntoIterator<Item = SleeveInstance>, config: &SleeveConfig) -> Self {
        let index = SleeveGrid::build(sleeves, config.duplicate_search_radius());
        tracing::debug!(sleeves = index.len(), "Built sleeve index");
        Self {
            index,
            individual_tolerance: config.individual_tolerance,
            cluster_tolerance: config.cluster_tolerance,
        }
    }

    /// Duplicate check with the pass tolerances
    pub fn is_duplicate(&self, point: &Point3<f64>, host_filter: Option<HostKind>) -> bool {
        is_duplicate(
            point,
            self.individual_tolerance,
            self.cluster_tolerance,
            &self.index,
            host_filter,
        )
    }

    /// Add a sleeve placed in this pass
    pub fn record(&mut self, sleeve: SleeveInstance) {
        self.index.insert(sleeve);
    }

    /// Forget sleeves recorded after the index held `len` of them
    pub fn rollback_to(&mut self, len: usize) {
        self.index.truncate(len);
    }

    pub fn index(&self) -> &SleeveGrid {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
