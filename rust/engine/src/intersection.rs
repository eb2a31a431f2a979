// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Intersection engine: where does an MEP centerline cross a host solid?
//!
//! For each segment:
//! 1. Grow the segment's box by a fixed tolerance
//! 2. Drop candidates whose box misses it (mandatory, solids are expensive)
//! 3. Fetch the candidate's cached host-space solid
//! 4. Intersect the centerline with every face
//! 5. Reduce the hits to one representative point
//!
//! A failing candidate is logged and skipped; it never aborts the segment.

use crate::cache::SolidCache;
use crate::config::SleeveConfig;
use crate::error::Error;
use crate::model::{ElementId, MepSegment, PenetrationResult, StructuralCandidate};
use crate::provider::ModelProvider;
use crate::spatial::StructuralPartition;
use mep_sleeve_geometry::{BoundingBox, Point3};
use std::cmp::Ordering;

/// Penetrations of one segment plus the candidates that failed
#[derive(Debug, Default)]
pub struct IntersectionReport {
    pub results: Vec<PenetrationResult>,
    pub errors: Vec<(ElementId, Error)>,
}

/// Line/solid intersection with a per-pass solid cache
#[derive(Debug)]
pub struct IntersectionEngine {
    box_tolerance: f64,
    max_offset: f64,
    cache: SolidCache,
}

impl IntersectionEngine {
    pub fn new(config: &SleeveConfig) -> Self {
        Self {
            box_tolerance: config.segment_box_tolerance,
            max_offset: config.penetration_max_offset,
            cache: SolidCache::new(),
        }
    }

    /// Test `segment` against the candidates of `partition` near it
    pub fn find_in_partition<P: ModelProvider + ?Sized>(
        &mut self,
        provider: &P,
        segment: &MepSegment,
        partition: &StructuralPartition,
    ) -> IntersectionReport {
        let search = segment.line.bounds().expanded(self.box_tolerance);
        let nearby = partition.query_box(&search);
        self.find_intersections(provider, segment, nearby)
    }

    /// Test `segment` against each candidate
    pub fn find_intersections<'c, P, I>(
        &mut self,
        provider: &P,
        segment: &MepSegment,
        candidates: I,
    ) -> IntersectionReport
    where
        P: ModelProvider + ?Sized,
        I: IntoIterator<Item = &'c StructuralCandidate>,
    {
        let search = segment.line.bounds().expanded(self.box_tolerance);
        let mut report = IntersectionReport::default();

        for candidate in candidates {
            if !candidate.bbox.intersects(&search) {
                continue;
            }

            let solid = match self.cache.get_or_extract(provider, candidate) {
                Ok(Some(solid)) => solid,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(
                        segment = %segment.id,
                        host = %candidate.id,
                        error = %err,
                        "Skipping structural candidate after geometry failure"
                    );
                    report.errors.push((candidate.id, err));
                    continue;
                }
            };

            let hits = solid.intersect_line(&segment.line);
            let Some(point) = representative_point(&hits) else {
                continue;
            };
            let Some(bounds) = BoundingBox::from_points(hits.iter()) else {
                continue;
            };

            let offset = segment.line.distance_to_point(&point);
            if offset > self.max_offset {
                tracing::warn!(
                    segment = %segment.id,
                    host = %candidate.id,
                    offset,
                    "Penetration point off the centerline, discarded"
                );
                continue;
            }

            report.results.push(PenetrationResult {
                candidate: *candidate,
                bounds,
                point,
            });
        }

        tracing::trace!(
            segment = %segment.id,
            penetrations = report.results.len(),
            "Intersection done"
        );
        report
    }

    /// Solid cache of this pass
    pub fn cache(&self) -> &SolidCache {
        &self.cache
    }

    /// Forget cached solids. Call between independent passes.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

/// Reduce face hits to one point.
///
/// One hit is returned as is. For two or more, the midpoint of the pair
/// with the largest separation. Points are put in lexicographic order
/// first and only a strictly larger distance replaces the current pair,
/// so the answer does not depend on the order the hits arrived in.
pub fn representative_point(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    match points {
        [] => None,
        [single] => Some(*single),
        _ => {
            let mut sorted = points.to_vec();
            sorted.sort_by(lexicographic);

            let mut best = (0, 1);
            let mut best_dist = -1.0;
            for i in 0..sorted.len() {
                for j in (i + 1)..sorted.len() {
                    let dist = (sorted[j] - sorted[i]).norm_squared();
                    if dist > best_dist {
                        best_dist = dist;
                        best = (i, j);
                    }
                }
            }
            Some(nalgebra::center(&sorted[best.0], &sorted[best.1]))
        }
    }
}

fn lexicographic(a: &Point3<f64>, b: &Point3<f64>) -> Ordering {
    a.x.total_cmp(&b.x)
        .then(a.y.total_cmp(&b.y))
        .then(a.z.total_cmp(&b.z))
}
