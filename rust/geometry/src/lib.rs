// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MEP Sleeve Geometry
//!
//! Pure geometry used by the sleeve placement engine: axis-aligned boxes,
//! affine transforms between linked documents, centerline segments and
//! planar-faced solids with a line intersection primitive.
//!
//! Nothing in this crate talks to a host model.

pub mod bbox;
pub mod error;
pub mod line;
pub mod solid;
pub mod transform;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};

pub use bbox::{boxes_intersect, point_in_box, transform_box, BoundingBox, DEFAULT_BOX_EPSILON};
pub use error::{Error, Result};
pub use line::Line3;
pub use solid::{Plane, PlanarFace, Solid};
pub use transform::Transform;
