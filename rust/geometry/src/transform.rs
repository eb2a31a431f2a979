// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Affine transforms between document coordinate spaces
//!
//! A linked model carries a link -> host transform. Nested links compose
//! their transforms, and geometry instances inside a family carry one more.
//! All of them are stored as a 4x4 homogeneous matrix.

use crate::error::{Error, Result};
use nalgebra::{Matrix4, Point3, Vector3};
use std::hash::{Hash, Hasher};

/// Tolerance used when deciding whether a matrix is the identity
const IDENTITY_EPSILON: f64 = 1e-12;

/// Affine transform from a local coordinate space to its parent space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Matrix4<f64>,
}

impl Transform {
    /// The identity transform (host-native elements)
    #[inline]
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Wrap an existing homogeneous matrix
    #[inline]
    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    /// Pure translation
    pub fn translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            matrix: Matrix4::new_translation(&Vector3::new(x, y, z)),
        }
    }

    /// Rotation about the global Z axis through `origin`
    pub fn rotation_z(origin: Point3<f64>, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        let x_axis = Vector3::new(cos, sin, 0.0);
        let y_axis = Vector3::new(-sin, cos, 0.0);
        let z_axis = Vector3::z();
        let rotation = Self::from_axes(Point3::origin(), x_axis, y_axis, z_axis);
        Self::translation(-origin.x, -origin.y, -origin.z)
            .then(&rotation)
            .then(&Self::translation(origin.x, origin.y, origin.z))
    }

    /// Build a transform from an origin and the parent-space directions of
    /// the local axes. Columns of the matrix are the axes.
    pub fn from_axes(
        origin: Point3<f64>,
        x_axis: Vector3<f64>,
        y_axis: Vector3<f64>,
        z_axis: Vector3<f64>,
    ) -> Self {
        let mut matrix = Matrix4::identity();
        matrix[(0, 0)] = x_axis.x;
        matrix[(1, 0)] = x_axis.y;
        matrix[(2, 0)] = x_axis.z;
        matrix[(0, 1)] = y_axis.x;
        matrix[(1, 1)] = y_axis.y;
        matrix[(2, 1)] = y_axis.z;
        matrix[(0, 2)] = z_axis.x;
        matrix[(1, 2)] = z_axis.y;
        matrix[(2, 2)] = z_axis.z;
        matrix[(0, 3)] = origin.x;
        matrix[(1, 3)] = origin.y;
        matrix[(2, 3)] = origin.z;
        Self { matrix }
    }

    /// Underlying homogeneous matrix
    #[inline]
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Check whether this transform leaves every point unchanged
    pub fn is_identity(&self) -> bool {
        let identity = Matrix4::<f64>::identity();
        self.matrix
            .iter()
            .zip(identity.iter())
            .all(|(a, b)| (a - b).abs() <= IDENTITY_EPSILON)
    }

    /// Compose: apply `self` first, then `outer`.
    ///
    /// A linked model nested in another link gets
    /// `inner_link.then(&outer_link)` as its cumulative transform.
    #[inline]
    pub fn then(&self, outer: &Transform) -> Transform {
        Transform {
            matrix: outer.matrix * self.matrix,
        }
    }

    /// Inverse transform (host -> link)
    pub fn inverse(&self) -> Result<Transform> {
        self.matrix
            .try_inverse()
            .map(Transform::from_matrix)
            .ok_or(Error::SingularTransform)
    }

    /// Transform a point (translation applies)
    #[inline]
    pub fn apply_point(&self, point: &Point3<f64>) -> Point3<f64> {
        self.matrix.transform_point(point)
    }

    /// Transform a direction (translation ignored)
    #[inline]
    pub fn apply_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.matrix.transform_vector(vector)
    }

    /// Stable hash of the matrix contents, used in cache keys.
    ///
    /// `-0.0` and `0.0` hash the same so that transforms built along
    /// different paths still share cache entries.
    pub fn fingerprint(&self) -> u64 {
        use rustc_hash::FxHasher;
        let mut hasher = FxHasher::default();
        for value in self.matrix.iter() {
            let normalized = if *value == 0.0 { 0.0f64 } else { *value };
            normalized.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
