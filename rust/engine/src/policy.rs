// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pluggable placement policies: clearance and riser rotation.

use crate::config::ClearanceConfig;
use crate::host::HostType;
use crate::model::{Category, CrossSection, MepSegment};

/// Per-side clearance around an MEP section
pub trait ClearanceProvider {
    fn clearance(&self, segment: &MepSegment, host: &HostType) -> f64;
}

/// Clearance from [`ClearanceConfig`]: damper-connected ducts first, then
/// insulated runs, then the plain default.
#[derive(Debug, Clone, Default)]
pub struct DefaultClearance {
    config: ClearanceConfig,
}

impl DefaultClearance {
    pub fn new(config: ClearanceConfig) -> Self {
        Self { config }
    }
}

impl ClearanceProvider for DefaultClearance {
    fn clearance(&self, segment: &MepSegment, _host: &HostType) -> f64 {
        if segment.damper_connected && segment.category == Category::Duct {
            self.config.damper_side
        } else if segment.insulation_thickness > 0.0 {
            self.config.insulated
        } else {
            self.config.default
        }
    }
}

/// Decides whether a floor sleeve around a riser is turned 90 degrees
pub trait RiserRotationPolicy {
    fn should_rotate_riser_sleeve(&self, segment: &MepSegment) -> bool;
}

/// Rotates rectangular risers whose wide side runs mostly along Y.
///
/// Slab sleeves put their width along X by default; round risers never
/// need turning.
#[derive(Debug, Clone, Copy, Default)]
pub struct FootprintRiserPolicy;

impl RiserRotationPolicy for FootprintRiserPolicy {
    fn should_rotate_riser_sleeve(&self, segment: &MepSegment) -> bool {
        let CrossSection::Rectangular { width, height } = segment.cross_section else {
            return false;
        };
        if (width - height).abs() < 1e-9 {
            return false;
        }
        match segment.wide_axis {
            Some(axis) => {
                let wide_along_y = axis.y.abs() > axis.x.abs();
                // wide_axis follows the width side
                wide_along_y == (width >= height)
            }
            None => false,
        }
    }
}
