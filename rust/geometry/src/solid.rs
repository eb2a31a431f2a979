// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar-faced solids and the line/solid intersection primitive
//!
//! Host models hand over structural geometry as closed solids bounded by
//! planar polygons. The placement engine only needs two things from them:
//! whether they are non-degenerate (positive volume) and where a centerline
//! crosses their faces.

use crate::bbox::BoundingBox;
use crate::error::{Error, Result};
use crate::line::Line3;
use crate::transform::Transform;
use nalgebra::{Point3, Vector3};
use smallvec::SmallVec;

/// Tolerance on the segment parameter when accepting a face hit
const PARAM_EPSILON: f64 = 1e-9;

/// Minimum |normal . direction| before a line is considered parallel
const PARALLEL_EPSILON: f64 = 1e-12;

/// Plane definition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Point on the plane
    pub point: Point3<f64>,
    /// Normal vector (normalized)
    pub normal: Vector3<f64>,
}

impl Plane {
    /// Create a new plane
    pub fn new(point: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            point,
            normal: normal.normalize(),
        }
    }

    /// Signed distance from point to plane
    /// Positive = in front, Negative = behind
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        (point - self.point).dot(&self.normal)
    }

    /// Parameter along `line` where it meets the plane, `None` if parallel
    pub fn intersect_parameter(&self, line: &Line3) -> Option<f64> {
        let delta = line.end - line.start;
        let denom = self.normal.dot(&delta);
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }
        Some(-self.signed_distance(&line.start) / denom)
    }
}

/// Planar polygonal face of a solid
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarFace {
    vertices: Vec<Point3<f64>>,
    plane: Plane,
}

impl PlanarFace {
    /// Create a face from its boundary loop. The winding defines the
    /// outward normal (counter-clockwise seen from outside).
    pub fn new(vertices: Vec<Point3<f64>>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(Error::DegenerateFace(format!(
                "{} vertices, need at least 3",
                vertices.len()
            )));
        }
        let area_vector = newell_area_vector(&vertices);
        let normal = area_vector
            .try_normalize(1e-15)
            .ok_or_else(|| Error::DegenerateFace("zero area".to_string()))?;
        let plane = Plane::new(vertices[0], normal);
        Ok(Self { vertices, plane })
    }

    /// Boundary loop
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// Supporting plane
    pub fn plane(&self) -> &Plane {
        &self.plane
    }

    /// Unit outward normal
    pub fn normal(&self) -> Vector3<f64> {
        self.plane.normal
    }

    /// Area-weighted normal (half of the Newell sum)
    fn area_vector(&self) -> Vector3<f64> {
        newell_area_vector(&self.vertices)
    }

    /// Where `line` crosses this face, if it does within the segment
    pub fn intersect_segment(&self, line: &Line3) -> Option<Point3<f64>> {
        let t = self.plane.intersect_parameter(line)?;
        if !(-PARAM_EPSILON..=1.0 + PARAM_EPSILON).contains(&t) {
            return None;
        }
        let hit = line.point_at(t.clamp(0.0, 1.0));
        self.contains_coplanar(&hit).then_some(hit)
    }

    /// Point-in-polygon for a point already on the plane.
    ///
    /// Drops the dominant normal axis and runs a crossing-number test on
    /// the remaining two coordinates.
    fn contains_coplanar(&self, point: &Point3<f64>) -> bool {
        let n = self.plane.normal;
        let (u, v) = if n.x.abs() >= n.y.abs() && n.x.abs() >= n.z.abs() {
            (1, 2)
        } else if n.y.abs() >= n.z.abs() {
            (0, 2)
        } else {
            (0, 1)
        };

        let (pu, pv) = (point[u], point[v]);
        let count = self.vertices.len();
        let mut inside = false;
        let mut j = count - 1;
        for i in 0..count {
            let (ui, vi) = (self.vertices[i][u], self.vertices[i][v]);
            let (uj, vj) = (self.vertices[j][u], self.vertices[j][v]);
            if (vi > pv) != (vj > pv) {
                let cross_u = ui + (pv - vi) / (vj - vi) * (uj - ui);
                if pu <= cross_u {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    fn transformed(&self, transform: &Transform) -> Result<Self> {
        Self::new(
            self.vertices
                .iter()
                .map(|p| transform.apply_point(p))
                .collect(),
        )
    }
}

/// Closed solid bounded by planar faces
#[derive(Debug, Clone, PartialEq)]
pub struct Solid {
    faces: Vec<PlanarFace>,
}

impl Solid {
    /// Create a solid from its faces
    pub fn new(faces: Vec<PlanarFace>) -> Self {
        Self { faces }
    }

    /// Axis-aligned box solid
    pub fn from_box(bbox: &BoundingBox) -> Result<Self> {
        let c = bbox.corners();
        let center = bbox.center();
        // corner indices: bit 0 = x, bit 1 = y, bit 2 = z
        let quads: [[usize; 4]; 6] = [
            [0, 2, 3, 1], // -z
            [4, 5, 7, 6], // +z
            [0, 4, 6, 2], // -x
            [1, 3, 7, 5], // +x
            [0, 1, 5, 4], // -y
            [2, 6, 7, 3], // +y
        ];
        let faces = quads
            .iter()
            .map(|q| oriented_face(q.iter().map(|&i| c[i]).collect(), &center))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { faces })
    }

    /// Box with the given half extents, placed by `transform`
    pub fn oriented_box(transform: &Transform, half_extents: Vector3<f64>) -> Result<Self> {
        let local = BoundingBox::new(
            Point3::from(-half_extents),
            Point3::from(half_extents),
        );
        Self::from_box(&local)?.transformed(transform)
    }

    /// Faces of the solid
    pub fn faces(&self) -> &[PlanarFace] {
        &self.faces
    }

    /// Enclosed volume (divergence theorem over the face loops)
    pub fn volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|face| face.vertices[0].coords.dot(&face.area_vector()))
            .sum::<f64>()
            / 3.0
    }

    /// Axis-aligned bounds of every vertex
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.faces.iter().flat_map(|f| f.vertices.iter()))
    }

    /// Transformed copy of the solid
    pub fn transformed(&self, transform: &Transform) -> Result<Self> {
        if transform.is_identity() {
            return Ok(self.clone());
        }
        let faces = self
            .faces
            .iter()
            .map(|f| f.transformed(transform))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { faces })
    }

    /// Intersect a segment with every face and collect all hit points.
    ///
    /// A line through a non-convex solid may enter and leave several times,
    /// so nothing is deduplicated or reduced here.
    pub fn intersect_line(&self, line: &Line3) -> SmallVec<[Point3<f64>; 4]> {
        self.faces
            .iter()
            .filter_map(|face| face.intersect_segment(line))
            .collect()
    }
}

/// Twice-area normal via Newell's method, halved
fn newell_area_vector(vertices: &[Point3<f64>]) -> Vector3<f64> {
    let mut sum = Vector3::zeros();
    for (i, a) in vertices.iter().enumerate() {
        let b = &vertices[(i + 1) % vertices.len()];
        sum += a.coords.cross(&b.coords);
    }
    sum * 0.5
}

/// Build a face whose normal points away from `interior`
fn oriented_face(mut vertices: Vec<Point3<f64>>, interior: &Point3<f64>) -> Result<PlanarFace> {
    let face = PlanarFace::new(vertices.clone())?;
    if face.plane.signed_distance(interior) > 0.0 {
        vertices.reverse();
        return PlanarFace::new(vertices);
    }
    Ok(face)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wall_box() -> Solid {
        // 200 mm wall centred on x = 5, running along Y
        Solid::from_box(&BoundingBox::new(
            Point3::new(4.9, -5.0, 0.0),
            Point3::new(5.1, 5.0, 4.0),
        ))
        .unwrap()
    }

    #[test]
    fn test_plane_signed_distance() {
        let plane = Plane::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0));

        assert_eq!(plane.signed_distance(&Point3::new(0.0, 0.0, 5.0)), 5.0);
        assert_eq!(plane.signed_distance(&Point3::new(0.0, 0.0, -5.0)), -5.0);
        assert_eq!(plane.signed_distance(&Point3::new(5.0, 5.0, 0.0)), 0.0);
    }

    #[test]
    fn test_box_volume_positive() {
        assert_relative_eq!(wall_box().volume(), 0.2 * 10.0 * 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_box_normals_point_outward() {
        let solid = wall_box();
        let center = solid.bounds().unwrap().center();
        for face in solid.faces() {
            assert!(face.plane().signed_distance(&center) < 0.0);
        }
    }

    #[test]
    fn test_line_through_wall_hits_both_faces() {
        let line = Line3::new(Point3::new(0.0, 0.0, 3.0), Point3::new(10.0, 0.0, 3.0)).unwrap();
        let mut hits = wall_box().intersect_line(&line);
        hits.sort_by(|a, b| a.x.total_cmp(&b.x));
        assert_eq!(hits.len(), 2);
        assert_relative_eq!(hits[0].x, 4.9, epsilon = 1e-9);
        assert_relative_eq!(hits[1].x, 5.1, epsilon = 1e-9);
    }

    #[test]
    fn test_line_ending_inside_hits_once() {
        let line = Line3::new(Point3::new(0.0, 0.0, 3.0), Point3::new(5.04, 0.0, 3.0)).unwrap();
        let hits = wall_box().intersect_line(&line);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_line_missing_solid() {
        let line = Line3::new(Point3::new(0.0, 6.0, 3.0), Point3::new(10.0, 6.0, 3.0)).unwrap();
        assert!(wall_box().intersect_line(&line).is_empty());
    }

    #[test]
    fn test_transformed_volume_preserved() {
        let t = Transform::rotation_z(Point3::new(1.0, 0.0, 0.0), 0.4)
            .then(&Transform::translation(3.0, 2.0, 1.0));
        let moved = wall_box().transformed(&t).unwrap();
        assert_relative_eq!(moved.volume(), wall_box().volume(), epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_face_rejected() {
        let collinear = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        assert!(PlanarFace::new(collinear).is_err());
    }
}
