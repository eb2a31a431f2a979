// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded 3D line segments (MEP centerlines, wall and framing axes)

use crate::bbox::BoundingBox;
use crate::error::{Error, Result};
use crate::transform::Transform;
use nalgebra::{Point3, Vector3};

/// Segments shorter than this are treated as degenerate
const MIN_LENGTH: f64 = 1e-9;

/// Bounded line segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line3 {
    pub start: Point3<f64>,
    pub end: Point3<f64>,
}

impl Line3 {
    /// Create a segment, rejecting zero length
    pub fn new(start: Point3<f64>, end: Point3<f64>) -> Result<Self> {
        if (end - start).norm() < MIN_LENGTH {
            return Err(Error::DegenerateLine(format!(
                "zero-length segment at ({:.3}, {:.3}, {:.3})",
                start.x, start.y, start.z
            )));
        }
        Ok(Self { start, end })
    }

    /// Segment length
    #[inline]
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Unit direction from start to end
    #[inline]
    pub fn direction(&self) -> Vector3<f64> {
        (self.end - self.start).normalize()
    }

    /// Point at parameter `t` (0 = start, 1 = end)
    #[inline]
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        self.start + (self.end - self.start) * t
    }

    /// Midpoint of the segment
    #[inline]
    pub fn midpoint(&self) -> Point3<f64> {
        nalgebra::center(&self.start, &self.end)
    }

    /// Axis-aligned bounds of both endpoints
    pub fn bounds(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        bbox.include_point(&self.start);
        bbox.include_point(&self.end);
        bbox
    }

    /// Parameter of the closest point on the infinite line
    pub fn project_parameter(&self, point: &Point3<f64>) -> f64 {
        let delta = self.end - self.start;
        (point - self.start).dot(&delta) / delta.norm_squared()
    }

    /// Distance from `point` to the bounded segment
    pub fn distance_to_point(&self, point: &Point3<f64>) -> f64 {
        let t = self.project_parameter(point).clamp(0.0, 1.0);
        (point - self.point_at(t)).norm()
    }

    /// Project `point` onto this line in plan, keeping the point's own
    /// elevation. Used to move a penetration onto a wall or beam centerline
    /// without changing its height.
    ///
    /// Falls back to `point` when the line is vertical in plan.
    pub fn project_xy(&self, point: &Point3<f64>) -> Point3<f64> {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        let len_sq = dx * dx + dy * dy;
        if len_sq < MIN_LENGTH * MIN_LENGTH {
            return *point;
        }
        let t = ((point.x - self.start.x) * dx + (point.y - self.start.y) * dy) / len_sq;
        Point3::new(self.start.x + dx * t, self.start.y + dy * t, point.z)
    }

    /// Transformed copy
    pub fn transformed(&self, transform: &Transform) -> Line3 {
        Line3 {
            start: transform.apply_point(&self.start),
            end: transform.apply_point(&self.end),
        }
    }

    /// Angle between this segment and the global Z axis, in radians
    pub fn angle_from_vertical(&self) -> f64 {
        let cos = self.direction().z.abs().min(1.0);
        cos.acos()
    }
}
