// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned bounding boxes
//!
//! Boxes are the broadphase for everything the engine does: section-box
//! culling, candidate pre-checks before solid intersection, and cluster
//! containment during duplicate suppression.

use crate::transform::Transform;
use nalgebra::Point3;

/// Default tolerance for point containment, absorbs kernel jitter
pub const DEFAULT_BOX_EPSILON: f64 = 1e-6;

/// Axis-aligned bounding box. Callers keep `min <= max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: Point3<f64>,
    /// Maximum corner
    pub max: Point3<f64>,
}

impl BoundingBox {
    /// Create a box from its corners
    #[inline]
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Create an inverted box suitable for expansion
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    /// Smallest box containing every point, `None` for no points
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3<f64>>,
    {
        let mut bbox = Self::empty();
        let mut any = false;
        for p in points {
            bbox.include_point(p);
            any = true;
        }
        any.then_some(bbox)
    }

    /// Check if the box has been given at least one point
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Grow the box to include a point
    #[inline]
    pub fn include_point(&mut self, p: &Point3<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Copy of the box grown by `tolerance` on every side
    pub fn expanded(&self, tolerance: f64) -> Self {
        Self {
            min: Point3::new(
                self.min.x - tolerance,
                self.min.y - tolerance,
                self.min.z - tolerance,
            ),
            max: Point3::new(
                self.max.x + tolerance,
                self.max.y + tolerance,
                self.max.z + tolerance,
            ),
        }
    }

    /// Center of the box
    #[inline]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }

    /// Overlap test, see [`boxes_intersect`]
    #[inline]
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        boxes_intersect(self, other)
    }

    /// Containment test, see [`point_in_box`]
    #[inline]
    pub fn contains(&self, point: &Point3<f64>, epsilon: f64) -> bool {
        point_in_box(point, self, epsilon)
    }

    /// Plan-only containment: Z is ignored.
    pub fn contains_xy(&self, point: &Point3<f64>, epsilon: f64) -> bool {
        point.x >= self.min.x - epsilon
            && point.x <= self.max.x + epsilon
            && point.y >= self.min.y - epsilon
            && point.y <= self.max.y + epsilon
    }

    /// Transformed copy, see [`transform_box`]
    #[inline]
    pub fn transformed(&self, transform: &Transform) -> BoundingBox {
        transform_box(self, transform)
    }

    /// Parametric overlap of the segment `start -> end` with this box.
    ///
    /// Returns the clipped parameter range `(t0, t1)` in `[0, 1]` or `None`
    /// when the segment misses the box (slab clipping).
    pub fn clip_segment(&self, start: &Point3<f64>, end: &Point3<f64>) -> Option<(f64, f64)> {
        let mut t0 = 0.0f64;
        let mut t1 = 1.0f64;
        let dir = end - start;

        for axis in 0..3 {
            let origin = start[axis];
            let delta = dir[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if delta.abs() < 1e-15 {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }

            let mut near = (lo - origin) / delta;
            let mut far = (hi - origin) / delta;
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            t0 = t0.max(near);
            t1 = t1.min(far);
            if t0 > t1 {
                return None;
            }
        }

        Some((t0, t1))
    }
}

/// Axis-aligned overlap test on all three axes.
///
/// Touching faces count as overlapping.
#[inline]
pub fn boxes_intersect(a: &BoundingBox, b: &BoundingBox) -> bool {
    a.min.x <= b.max.x
        && a.max.x >= b.min.x
        && a.min.y <= b.max.y
        && a.max.y >= b.min.y
        && a.min.z <= b.max.z
        && a.max.z >= b.min.z
}

/// Apply `transform` to all eight corners and return their axis-aligned
/// bounds. A rotated link box is not axis-aligned in host space until its
/// corners have been transformed.
pub fn transform_box(bbox: &BoundingBox, transform: &Transform) -> BoundingBox {
    if transform.is_identity() {
        return *bbox;
    }
    let mut out = BoundingBox::empty();
    for corner in bbox.corners() {
        out.include_point(&transform.apply_point(&corner));
    }
    out
}

/// Tolerance-inclusive containment test
#[inline]
pub fn point_in_box(point: &Point3<f64>, bbox: &BoundingBox, epsilon: f64) -> bool {
    point.x >= bbox.min.x - epsilon
        && point.x <= bbox.max.x + epsilon
        && point.y >= bbox.min.y - epsilon
        && point.y <= bbox.max.y + epsilon
        && point.z >= bbox.min.z - epsilon
        && point.z <= bbox.max.z + epsilon
}
