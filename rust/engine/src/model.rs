// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data model shared by the collectors, the intersection engine, the
//! placement resolver and duplicate suppression.
//!
//! Everything here is a read-only snapshot taken from the model provider
//! for the duration of one placement pass.

use mep_sleeve_geometry::{BoundingBox, Line3, Point3, Solid, Transform, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Document handle (host document or a linked model)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u32);

/// Element id, unique within its document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Element categories the engine asks the provider for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Wall,
    Floor,
    StructuralFraming,
    Duct,
    Pipe,
    CableTray,
    Conduit,
}

impl Category {
    /// Hosts a sleeve can be cut into
    pub const STRUCTURAL: [Category; 3] =
        [Category::Wall, Category::Floor, Category::StructuralFraming];

    /// Linear MEP runs that get sleeves
    pub const MEP: [Category; 4] = [
        Category::Duct,
        Category::Pipe,
        Category::CableTray,
        Category::Conduit,
    ];

    #[inline]
    pub fn is_structural(self) -> bool {
        Self::STRUCTURAL.contains(&self)
    }

    #[inline]
    pub fn is_mep(self) -> bool {
        Self::MEP.contains(&self)
    }
}

/// Cross-section of an MEP run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CrossSection {
    Rectangular { width: f64, height: f64 },
    Round { diameter: f64 },
}

impl CrossSection {
    /// Horizontal size of the section (diameter for round)
    pub fn width(&self) -> f64 {
        match *self {
            CrossSection::Rectangular { width, .. } => width,
            CrossSection::Round { diameter } => diameter,
        }
    }

    /// Vertical size of the section (diameter for round)
    pub fn height(&self) -> f64 {
        match *self {
            CrossSection::Rectangular { height, .. } => height,
            CrossSection::Round { diameter } => diameter,
        }
    }

    pub fn is_round(&self) -> bool {
        matches!(self, CrossSection::Round { .. })
    }

    /// Section grown by `margin` on every side
    pub fn grown(&self, margin: f64) -> CrossSection {
        match *self {
            CrossSection::Rectangular { width, height } => CrossSection::Rectangular {
                width: width + 2.0 * margin,
                height: height + 2.0 * margin,
            },
            CrossSection::Round { diameter } => CrossSection::Round {
                diameter: diameter + 2.0 * margin,
            },
        }
    }
}

/// MEP curve data as the provider reports it, in its own document space
#[derive(Debug, Clone, PartialEq)]
pub struct MepCurve {
    pub line: Line3,
    pub cross_section: CrossSection,
    /// Insulation or lining thickness, zero when bare
    pub insulation_thickness: f64,
    /// A damper or similar accessory is connected to this run
    pub damper_connected: bool,
    /// Direction of the section's wide side, when the provider knows it
    pub wide_axis: Option<Vector3<f64>>,
}

/// A linear MEP run in host coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct MepSegment {
    pub id: ElementId,
    pub document: DocumentId,
    pub category: Category,
    /// Centerline in host coordinates
    pub line: Line3,
    pub cross_section: CrossSection,
    /// Source document -> host transform
    pub transform: Transform,
    pub insulation_thickness: f64,
    pub damper_connected: bool,
    /// Wide side direction in host coordinates
    pub wide_axis: Option<Vector3<f64>>,
}

/// A host-penetrable element. The representative solid is extracted
/// lazily through [`crate::cache::SolidCache`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructuralCandidate {
    pub id: ElementId,
    pub document: DocumentId,
    pub category: Category,
    /// World-space (host) axis-aligned bounds
    pub bbox: BoundingBox,
    /// Link -> host, identity for host-native elements
    pub transform: Transform,
}

/// A centerline crossing of one structural candidate
#[derive(Debug, Clone, PartialEq)]
pub struct PenetrationResult {
    pub candidate: StructuralCandidate,
    /// Bounds of every face hit
    pub bounds: BoundingBox,
    /// Representative penetration point
    pub point: Point3<f64>,
}

/// Which way a placed sleeve faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOrientation {
    X,
    Y,
    FloorHosted,
    Unknown,
}

impl HostOrientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostOrientation::X => "X",
            HostOrientation::Y => "Y",
            HostOrientation::FloorHosted => "FloorHosted",
            HostOrientation::Unknown => "Unknown",
        }
    }

    /// Orientation tag from a horizontal host normal
    pub fn from_normal(normal: &Vector3<f64>) -> Self {
        if normal.x.abs() >= normal.y.abs() {
            HostOrientation::X
        } else {
            HostOrientation::Y
        }
    }
}

impl fmt::Display for HostOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sleeve family flavor by host. Family names end with the suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    Wall,
    Slab,
}

impl HostKind {
    pub const ALL: [HostKind; 2] = [HostKind::Wall, HostKind::Slab];

    /// Family name suffix of individual sleeves for this host
    pub fn family_suffix(&self) -> &'static str {
        match self {
            HostKind::Wall => "OnWall",
            HostKind::Slab => "OnSlab",
        }
    }

    /// Substring cluster family names carry for this host
    pub fn cluster_marker(&self) -> &'static str {
        match self {
            HostKind::Wall => "Wall",
            HostKind::Slab => "Slab",
        }
    }
}

/// Resolved placement for one penetration
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementSpec {
    pub point: Point3<f64>,
    /// Host thickness along its normal
    pub depth: f64,
    pub width: f64,
    pub height: f64,
    /// Set for round sleeves
    pub diameter: Option<f64>,
    /// Rotation about the vertical axis through `point`, applied after
    /// the instance has been created
    pub rotation: f64,
    pub orientation: HostOrientation,
    pub host_kind: HostKind,
    pub level: ElementId,
}

/// Classification of an existing sleeve by its family name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleeveKind {
    Individual,
    Cluster,
    Other,
}

impl SleeveKind {
    /// Individual: ends with a host suffix and does not start with
    /// "Cluster". Cluster: starts with "Cluster", or the legacy "Rect"
    /// ending.
    pub fn classify(family_name: &str) -> Self {
        let is_cluster_prefix = family_name.starts_with("Cluster");
        let has_host_suffix = family_name.ends_with(HostKind::Wall.family_suffix())
            || family_name.ends_with(HostKind::Slab.family_suffix());

        if has_host_suffix && !is_cluster_prefix {
            SleeveKind::Individual
        } else if is_cluster_prefix || family_name.ends_with("Rect") {
            SleeveKind::Cluster
        } else {
            SleeveKind::Other
        }
    }
}

/// A placed sleeve as read from the model
#[derive(Debug, Clone, PartialEq)]
pub struct SleeveInstance {
    pub id: ElementId,
    pub family_name: String,
    pub location: Point3<f64>,
    pub bbox: BoundingBox,
}

impl SleeveInstance {
    pub fn kind(&self) -> SleeveKind {
        SleeveKind::classify(&self.family_name)
    }
}

/// Level (storey) datum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub id: ElementId,
    pub elevation: f64,
}

/// A linked model placed in the host document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkedDocument {
    pub document: DocumentId,
    /// Cumulative link -> host transform
    pub transform: Transform,
    pub visible: bool,
}

/// Geometry as returned by the provider
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryObject {
    Solid(Solid),
    /// Nested family geometry with its own placement
    Instance {
        transform: Transform,
        objects: Vec<GeometryObject>,
    },
}

/// Parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Double(f64),
    Integer(i64),
    Text(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Double(v) => Some(*v),
            ParameterValue::Integer(v) => Some(*v as f64),
            ParameterValue::Text(_) => None,
        }
    }

    /// Yes/no parameters are stored as integers
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Integer(v) => Some(*v != 0),
            ParameterValue::Double(v) => Some(*v != 0.0),
            ParameterValue::Text(_) => None,
        }
    }
}

/// Outcome of a parameter write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterWrite {
    Written,
    NotFoundOrReadOnly,
}

/// Structural usage passed to instance creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralType {
    NonStructural,
    Beam,
    Column,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_individual() {
        assert_eq!(SleeveKind::classify("SleeveRoundOnWall"), SleeveKind::Individual);
        assert_eq!(SleeveKind::classify("SleeveRectangularOnSlab"), SleeveKind::Individual);
    }

    #[test]
    fn test_classify_cluster() {
        assert_eq!(SleeveKind::classify("ClusterOpeningOnWall"), SleeveKind::Cluster);
        assert_eq!(SleeveKind::classify("ClusterSlab"), SleeveKind::Cluster);
        assert_eq!(SleeveKind::classify("LegacyOpeningRect"), SleeveKind::Cluster);
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(SleeveKind::classify("GenericDoor"), SleeveKind::Other);
    }

    #[test]
    fn test_orientation_from_normal() {
        assert_eq!(HostOrientation::from_normal(&Vector3::new(1.0, 0.0, 0.0)), HostOrientation::X);
        assert_eq!(HostOrientation::from_normal(&Vector3::new(0.3, -0.9, 0.0)), HostOrientation::Y);
    }

    #[test]
    fn test_cross_section_grown() {
        let rect = CrossSection::Rectangular { width: 0.3, height: 0.2 }.grown(0.05);
        assert!((rect.width() - 0.4).abs() < 1e-12);
        assert!((rect.height() - 0.3).abs() < 1e-12);
        let round = CrossSection::Round { diameter: 0.1 }.grown(0.05);
        assert!((round.width() - 0.2).abs() < 1e-12);
    }
}
