// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placement configuration.
//!
//! Tolerances, clearances and family names are coordination conventions,
//! so they live here instead of in the algorithms. All lengths are metres.

use crate::error::{Error, Result};
use crate::model::{Category, HostKind};
use serde::{Deserialize, Serialize};

/// Per-side clearance added around an MEP section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearanceConfig {
    /// Bare runs.
    pub default: f64,
    /// Insulated or lined runs, on top of the insulation itself.
    pub insulated: f64,
    /// Runs with a damper connected next to the penetration.
    pub damper_side: f64,
}

impl Default for ClearanceConfig {
    fn default() -> Self {
        Self {
            default: 0.05,
            insulated: 0.025,
            damper_side: 0.10,
        }
    }
}

/// Sleeve family names. Individual sleeve families must end with the
/// host suffix ("OnWall" / "OnSlab") for duplicate detection to see them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleeveFamilies {
    pub rectangular_wall: String,
    pub round_wall: String,
    pub rectangular_slab: String,
    pub round_slab: String,
}

impl SleeveFamilies {
    /// Family to place for a host and section shape.
    pub fn family_for(&self, host: HostKind, round: bool) -> &str {
        match (host, round) {
            (HostKind::Wall, false) => &self.rectangular_wall,
            (HostKind::Wall, true) => &self.round_wall,
            (HostKind::Slab, false) => &self.rectangular_slab,
            (HostKind::Slab, true) => &self.round_slab,
        }
    }
}

impl Default for SleeveFamilies {
    fn default() -> Self {
        Self {
            rectangular_wall: "SleeveRectangularOnWall".into(),
            round_wall: "SleeveRoundOnWall".into(),
            rectangular_slab: "SleeveRectangularOnSlab".into(),
            round_slab: "SleeveRoundOnSlab".into(),
        }
    }
}

/// Configuration for one placement pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleeveConfig {
    /// Two individual sleeves closer than this are duplicates.
    pub individual_tolerance: f64,
    /// Growth applied to cluster boxes before containment tests.
    pub cluster_tolerance: f64,
    /// Growth of a segment's box before the candidate pre-check.
    pub segment_box_tolerance: f64,
    /// Fraction of host thickness under which an ending run is a stub.
    pub stub_fraction: f64,
    /// Runs within this angle of vertical are risers.
    pub riser_angle_degrees: f64,
    /// Share of a run inside a beam's box above which the raw
    /// penetration point is kept.
    pub framing_force_center_ratio: f64,
    /// Floor thickness when no type parameter resolves.
    pub default_floor_thickness: f64,
    /// Framing width when "b" does not resolve.
    pub default_framing_width: f64,
    /// Placement points this close to the origin are rejected.
    pub origin_epsilon: f64,
    /// Slack on the half-thickness drift check.
    pub placement_epsilon: f64,
    /// Maximum distance between a penetration point and its centerline.
    pub penetration_max_offset: f64,
    /// How far to look for a level when none is below the point.
    pub level_search_range: f64,
    /// MEP elements per sub-transaction.
    pub batch_size: usize,
    /// Cell size of the structural partition.
    pub structural_cell_size: f64,
    pub clearance: ClearanceConfig,
    /// MEP categories refused in non-structural floors.
    pub structural_floor_guard: Vec<Category>,
    /// MEP categories processed, in order.
    pub mep_categories: Vec<Category>,
    pub families: SleeveFamilies,
}

impl Default for SleeveConfig {
    fn default() -> Self {
        Self {
            individual_tolerance: 0.010,
            cluster_tolerance: 0.100,
            segment_box_tolerance: 0.3,
            stub_fraction: 0.25,
            riser_angle_degrees: 8.0,
            framing_force_center_ratio: 0.9,
            default_floor_thickness: 0.5,
            default_framing_width: 0.5,
            origin_epsilon: 1e-3,
            placement_epsilon: 0.005,
            penetration_max_offset: 0.01,
            level_search_range: 50.0,
            batch_size: 10,
            structural_cell_size: 5.0,
            clearance: ClearanceConfig::default(),
            structural_floor_guard: vec![Category::Duct],
            mep_categories: Category::MEP.to_vec(),
            families: SleeveFamilies::default(),
        }
    }
}

impl SleeveConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SleeveConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("individual_tolerance", self.individual_tolerance),
            ("cluster_tolerance", self.cluster_tolerance),
            ("structural_cell_size", self.structural_cell_size),
            ("default_floor_thickness", self.default_floor_thickness),
            ("default_framing_width", self.default_framing_width),
        ];
        for (name, value) in positive {
            if value <= 0.0 || !value.is_finite() {
                return Err(Error::Config(format!("{name} must be positive, got {value}")));
            }
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.framing_force_center_ratio) {
            return Err(Error::Config(format!(
                "framing_force_center_ratio must be within [0, 1], got {}",
                self.framing_force_center_ratio
            )));
        }
        if let Some(category) = self.mep_categories.iter().find(|c| !c.is_mep()) {
            return Err(Error::Config(format!("{category:?} is not an MEP category")));
        }
        Ok(())
    }

    /// Query radius for the sleeve grid.
    #[inline]
    pub fn duplicate_search_radius(&self) -> f64 {
        self.individual_tolerance.max(self.cluster_tolerance)
    }
}
