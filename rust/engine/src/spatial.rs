// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Plan grids for sleeve and structural lookup.
//!
//! Both grids bucket items into square XY cells. Queries return the union
//! of neighbouring cells; callers do their own exact distance filtering.
//! Z is not part of the key since sleeves and hosts differ little in height
//! relative to their plan spread.

use crate::model::{SleeveInstance, StructuralCandidate};
use mep_sleeve_geometry::{BoundingBox, Point3};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Items spanning more cells than this go to an always-returned list
const MAX_CELLS_PER_ITEM: i64 = 4096;

type CellKey = (i64, i64);

#[inline]
/// Cells covered between two keys on one axis, saturating on huge boxes
fn cell_span(from: i64, to: i64) -> i64 {
    to.saturating_sub(from).saturating_add(1)
}

fn cell_of(cell_size: f64, x: f64, y: f64) -> CellKey {
    (
        (x / cell_size).floor() as i64,
        (y / cell_size).floor() as i64,
    )
}

/// Existing sleeves bucketed by location point.
///
/// The cell size should be at least the largest duplicate tolerance, so a
/// 3x3 neighbourhood covers any query within that tolerance.
#[derive(Debug, Clone)]
pub struct SleeveGrid {
    cell_size: f64,
    grid: FxHashMap<CellKey, Vec<usize>>,
    sleeves: Vec<SleeveInstance>,
}

impl SleeveGrid {
    /// Create an empty grid
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(1e-6),
            grid: FxHashMap::default(),
            sleeves: Vec::new(),
        }
    }

    /// Build a grid from a set of sleeves
    pub fn build(sleeves: impl IntoIterator<Item = SleeveInstance>, cell_size: f64) -> Self {
        let mut grid = Self::new(cell_size);
        for sleeve in sleeves {
            grid.insert(sleeve);
        }
        grid
    }

    /// Add a sleeve (e.g. one just placed in this pass)
    pub fn insert(&mut self, sleeve: SleeveInstance) {
        let cell = cell_of(self.cell_size, sleeve.location.x, sleeve.location.y);
        self.grid.entry(cell).or_default().push(self.sleeves.len());
        self.sleeves.push(sleeve);
    }

    /// Sleeves whose cell lies within `radius` of `point`'s cell.
    ///
    /// A coarse pre-filter: results may be farther than `radius`.
    pub fn nearby(&self, point: &Point3<f64>, radius: f64) -> SmallVec<[&SleeveInstance; 8]> {
        let (cx, cy) = cell_of(self.cell_size, point.x, point.y);
        let span = ((radius / self.cell_size).ceil() as i64).max(1);
        let mut result = SmallVec::new();

        for dx in -span..=span {
            for dy in -span..=span {
                if let Some(indices) = self.grid.get(&(cx + dx, cy + dy)) {
                    result.extend(indices.iter().map(|&i| &self.sleeves[i]));
                }
            }
        }

        result
    }

    /// Every sleeve, unindexed
    pub fn iter(&self) -> impl Iterator<Item = &SleeveInstance> {
        self.sleeves.iter()
    }

    pub fn len(&self) -> usize {
        self.sleeves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sleeves.is_empty()
    }

    /// Forget every sleeve inserted after the first `len`
    pub fn truncate(&mut self, len: usize) {
        while self.sleeves.len() > len {
            let Some(sleeve) = self.sleeves.pop() else {
                break;
            };
            let cell = cell_of(self.cell_size, sleeve.location.x, sleeve.location.y);
            if let Some(indices) = self.grid.get_mut(&cell) {
                indices.pop();
                if indices.is_empty() {
                    self.grid.remove(&cell);
                }
            }
        }
    }

    /// Drop every sleeve, keeping the cell size
    pub fn clear(&mut self) {
        self.grid.clear();
        self.sleeves.clear();
    }
}

/// Structural candidates bucketed by plan extent.
///
/// Each candidate is registered in every cell its box overlaps, so a long
/// wall is found from any segment along it, not only near its center.
#[derive(Debug, Clone)]
pub struct StructuralPartition {
    cell_size: f64,
    grid: FxHashMap<CellKey, Vec<usize>>,
    oversized: Vec<usize>,
    candidates: Vec<StructuralCandidate>,
}

impl StructuralPartition {
    /// Build a partition over `candidates`
    pub fn build(candidates: Vec<StructuralCandidate>, cell_size: f64) -> Self {
        let cell_size = cell_size.max(1e-6);
        let mut grid: FxHashMap<CellKey, Vec<usize>> = FxHashMap::default();
        let mut oversized = Vec::new();

        for (index, candidate) in candidates.iter().enumerate() {
            let (x0, y0) = cell_of(cell_size, candidate.bbox.min.x, candidate.bbox.min.y);
            let (x1, y1) = cell_of(cell_size, candidate.bbox.max.x, candidate.bbox.max.y);
            if cell_span(x0, x1).saturating_mul(cell_span(y0, y1)) > MAX_CELLS_PER_ITEM {
                oversized.push(index);
                continue;
            }
            for x in x0..=x1 {
                for y in y0..=y1 {
                    grid.entry((x, y)).or_default().push(index);
                }
            }
        }

        tracing::debug!(
            candidates = candidates.len(),
            cells = grid.len(),
            oversized = oversized.len(),
            "Built structural partition"
        );

        Self {
            cell_size,
            grid,
            oversized,
            candidates,
        }
    }

    /// Candidates registered in any cell touched by `bbox`, in build order
    pub fn query_box(&self, bbox: &BoundingBox) -> Vec<&StructuralCandidate> {
        let (x0, y0) = cell_of(self.cell_size, bbox.min.x, bbox.min.y);
        let (x1, y1) = cell_of(self.cell_size, bbox.max.x, bbox.max.y);

        let mut indices: Vec<usize> = self.oversized.clone();
        if cell_span(x0, x1).saturating_mul(cell_span(y0, y1)) > MAX_CELLS_PER_ITEM {
            indices.extend(0..self.candidates.len());
        } else {
            for x in x0..=x1 {
                for y in y0..=y1 {
                    if let Some(cell) = self.grid.get(&(x, y)) {
                        indices.extend_from_slice(cell);
                    }
                }
            }
        }
        indices.sort_unstable();
        indices.dedup();
        indices.into_iter().map(|i| &self.candidates[i]).collect()
    }

    /// Candidates near `point` within `radius`
    pub fn query(&self, point: &Point3<f64>, radius: f64) -> Vec<&StructuralCandidate> {
        self.query_box(&BoundingBox::new(*point, *point).expanded(radius))
    }

    /// Every candidate
    pub fn candidates(&self) -> &[StructuralCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, DocumentId, ElementId};
    use mep_sleeve_geometry::Transform;

    fn sleeve(id: u64, x: f64, y: f64) -> SleeveInstance {
        let p = Point3::new(x, y, 3.0);
        SleeveInstance {
            id: ElementId(id),
            family_name: "SleeveRoundOnWall".into(),
            location: p,
            bbox: BoundingBox::new(p, p).expanded(0.05),
        }
    }

    fn candidate(id: u64, min: (f64, f64), max: (f64, f64)) -> StructuralCandidate {
        StructuralCandidate {
            id: ElementId(id),
            document: DocumentId(0),
            category: Category::Wall,
            bbox: BoundingBox::new(Point3::new(min.0, min.1, 0.0), Point3::new(max.0, max.1, 3.0)),
            transform: Transform::identity(),
        }
    }

    #[test]
    fn test_nearby_covers_neighbour_cells() {
        let grid = SleeveGrid::build(
            vec![sleeve(1, 0.05, 0.05), sleeve(2, 0.15, 0.05), sleeve(3, 5.0, 5.0)],
            0.1,
        );
        let found: Vec<u64> = grid
            .nearby(&Point3::new(0.09, 0.05, 3.0), 0.1)
            .iter()
            .map(|s| s.id.0)
            .collect();
        assert!(found.contains(&1));
        assert!(found.contains(&2));
        assert!(!found.contains(&3));
    }

    #[test]
    fn test_nearby_negative_coordinates() {
        let grid = SleeveGrid::build(vec![sleeve(1, -0.01, -0.01)], 0.1);
        assert_eq!(grid.nearby(&Point3::new(0.01, 0.01, 3.0), 0.1).len(), 1);
    }

    #[test]
    fn test_empty_query_is_valid() {
        let grid = SleeveGrid::new(0.1);
        assert!(grid.nearby(&Point3::origin(), 0.1).is_empty());
    }

    #[test]
    fn test_truncate_forgets_late_inserts() {
        let mut grid = SleeveGrid::build(vec![sleeve(1, 0.05, 0.05)], 0.1);
        grid.insert(sleeve(2, 0.06, 0.05));
        grid.insert(sleeve(3, 3.0, 3.0));
        grid.truncate(1);
        assert_eq!(grid.len(), 1);
        let found = grid.nearby(&Point3::new(0.05, 0.05, 3.0), 0.1);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, ElementId(1));
        assert!(grid.nearby(&Point3::new(3.0, 3.0, 3.0), 0.1).is_empty());
    }

    #[test]
    fn test_long_wall_found_far_from_center() {
        let partition = StructuralPartition::build(
            vec![candidate(1, (0.0, -0.1), (40.0, 0.1)), candidate(2, (100.0, 0.0), (101.0, 1.0))],
            5.0,
        );
        let near_end = partition.query(&Point3::new(38.0, 0.0, 1.0), 0.3);
        assert_eq!(near_end.len(), 1);
        assert_eq!(near_end[0].id, ElementId(1));
    }

    #[test]
    fn test_extreme_boxes_treated_as_oversized() {
        let partition = StructuralPartition::build(
            vec![
                candidate(1, (-f64::MAX, -f64::MAX), (f64::MAX, f64::MAX)),
                candidate(2, (0.0, 0.0), (1.0, 1.0)),
            ],
            5.0,
        );
        let near = partition.query(&Point3::new(0.5, 0.5, 1.0), 0.3);
        assert_eq!(near.len(), 2);

        let everywhere = partition.query_box(&BoundingBox::new(
            Point3::new(f64::MIN, f64::MIN, 0.0),
            Point3::new(f64::MAX, f64::MAX, 1.0),
        ));
        assert_eq!(everywhere.len(), 2);
    }

    #[test]
    fn test_query_deduplicates() {
        let partition =
            StructuralPartition::build(vec![candidate(1, (0.0, 0.0), (20.0, 20.0))], 5.0);
        let all = partition.query_box(&BoundingBox::new(
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(21.0, 21.0, 1.0),
        ));
        assert_eq!(all.len(), 1);
    }
}
