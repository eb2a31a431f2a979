// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placement resolver: turns one penetration into a sleeve placement or a
//! decline.
//!
//! Each host kind has its own rule for the point and depth:
//! - Walls project the penetration onto the centerline in plan
//! - Floors keep the penetration point and guard non-structural slabs
//! - Framing projects onto the beam axis unless the run lies mostly
//!   inside the beam
//!
//! Clearance, rotation, level and the sanity checks are shared. The
//! resolver never touches the model, so resolving the same input twice
//! gives the same answer.

use crate::config::SleeveConfig;
use crate::error::DeclineReason;
use crate::host::HostType;
use crate::model::{HostKind, HostOrientation, Level, MepSegment, PenetrationResult, PlacementSpec};
use crate::policy::{ClearanceProvider, DefaultClearance, FootprintRiserPolicy, RiserRotationPolicy};
use mep_sleeve_geometry::{Line3, Point3, Vector3};
use std::f64::consts::FRAC_PI_2;

/// Slack on "at or below" when choosing a level
const LEVEL_ELEVATION_SLACK: f64 = 1e-6;

/// Point, depth and facing before sizing
struct Anchor {
    point: Point3<f64>,
    depth: f64,
    orientation: HostOrientation,
    host_kind: HostKind,
    rotation: f64,
}

/// Resolves placement specs from penetrations
pub struct PlacementResolver {
    config: SleeveConfig,
    clearance: Box<dyn ClearanceProvider>,
    riser_policy: Box<dyn RiserRotationPolicy>,
}

impl PlacementResolver {
    /// Resolver with [`DefaultClearance`] and [`FootprintRiserPolicy`]
    pub fn new(config: SleeveConfig) -> Self {
        let clearance = DefaultClearance::new(config.clearance.clone());
        Self {
            config,
            clearance: Box::new(clearance),
            riser_policy: Box::new(FootprintRiserPolicy),
        }
    }

    pub fn with_clearance_provider(mut self, provider: impl ClearanceProvider + 'static) -> Self {
        self.clearance = Box::new(provider);
        self
    }

    pub fn with_riser_policy(mut self, policy: impl RiserRotationPolicy + 'static) -> Self {
        self.riser_policy = Box::new(policy);
        self
    }

    pub fn config(&self) -> &SleeveConfig {
        &self.config
    }

    /// Resolve where and how big the sleeve for `penetration` is.
    ///
    /// `levels` are the host document's levels.
    pub fn resolve(
        &self,
        segment: &MepSegment,
        penetration: &PenetrationResult,
        host: &HostType,
        levels: &[Level],
    ) -> Result<PlacementSpec, DeclineReason> {
        let anchor = match *host {
            HostType::Wall { .. } => self.wall_anchor(segment, penetration, host)?,
            HostType::Floor { thickness, structural } => {
                self.floor_anchor(segment, penetration, thickness, structural)?
            }
            HostType::Framing { .. } => self.framing_anchor(segment, penetration, host)?,
        };

        self.check_sanity(&anchor, penetration)?;

        let clearance = self.clearance.clearance(segment, host);
        let section = segment
            .cross_section
            .grown(segment.insulation_thickness)
            .grown(clearance);
        let (width, height) = (section.width(), section.height());
        if width <= 0.0 || height <= 0.0 || anchor.depth <= 0.0 {
            return Err(DeclineReason::NonPositiveSize);
        }

        let level = choose_level(levels, anchor.point.z, self.config.level_search_range)
            .ok_or(DeclineReason::NoLevel)?;

        Ok(PlacementSpec {
            point: anchor.point,
            depth: anchor.depth,
            width,
            height,
            diameter: section.is_round().then_some(width),
            rotation: anchor.rotation,
            orientation: anchor.orientation,
            host_kind: anchor.host_kind,
            level: level.id,
        })
    }

    fn wall_anchor(
        &self,
        segment: &MepSegment,
        penetration: &PenetrationResult,
        host: &HostType,
    ) -> Result<Anchor, DeclineReason> {
        let HostType::Wall { thickness, centerline } = host else {
            return Err(DeclineReason::UnsupportedHost);
        };
        let normal = host.plan_normal().ok_or(DeclineReason::UnsupportedHost)?;
        let point = centerline.project_xy(&penetration.point);

        // A run that ends inside the wall has an endpoint close to mid-wall
        let stub_limit = self.config.stub_fraction * thickness;
        let nearest_end = (segment.line.start - point)
            .norm()
            .min((segment.line.end - point).norm());
        if nearest_end < stub_limit {
            tracing::debug!(
                segment = %segment.id,
                host = %penetration.candidate.id,
                nearest_end,
                stub_limit,
                "Run ends inside the wall"
            );
            return Err(DeclineReason::StubPenetration);
        }

        let orientation = HostOrientation::from_normal(&normal);
        Ok(Anchor {
            point,
            depth: *thickness,
            orientation,
            host_kind: HostKind::Wall,
            rotation: facing_rotation(orientation),
        })
    }

    fn floor_anchor(
        &self,
        segment: &MepSegment,
        penetration: &PenetrationResult,
        thickness: f64,
        structural: bool,
    ) -> Result<Anchor, DeclineReason> {
        if !structural && self.config.structural_floor_guard.contains(&segment.category) {
            return Err(DeclineReason::NonStructuralFloor);
        }

        let riser_limit = self.config.riser_angle_degrees.to_radians();
        let rotate = if segment.line.angle_from_vertical() <= riser_limit {
            self.riser_policy.should_rotate_riser_sleeve(segment)
        } else {
            // Sloped run through a slab: follow the wide side, else the run
            let axis = segment.wide_axis.unwrap_or_else(|| segment.line.direction());
            axis.y.abs() > axis.x.abs()
        };

        Ok(Anchor {
            point: penetration.point,
            depth: thickness,
            orientation: HostOrientation::FloorHosted,
            host_kind: HostKind::Slab,
            rotation: if rotate { FRAC_PI_2 } else { 0.0 },
        })
    }

    fn framing_anchor(
        &self,
        segment: &MepSegment,
        penetration: &PenetrationResult,
        host: &HostType,
    ) -> Result<Anchor, DeclineReason> {
        let HostType::Framing { width, axis } = host else {
            return Err(DeclineReason::UnsupportedHost);
        };
        let normal = host.plan_normal().ok_or(DeclineReason::UnsupportedHost)?;

        let overlap = penetration
            .candidate
            .bbox
            .clip_segment(&segment.line.start, &segment.line.end)
            .map(|(t0, t1)| t1 - t0)
            .unwrap_or(0.0);
        let point = if overlap >= self.config.framing_force_center_ratio {
            penetration.point
        } else {
            axis.project_xy(&penetration.point)
        };

        let orientation = HostOrientation::from_normal(&normal);
        Ok(Anchor {
            point,
            depth: *width,
            orientation,
            host_kind: HostKind::Wall,
            rotation: facing_rotation(orientation),
        })
    }

    fn check_sanity(
        &self,
        anchor: &Anchor,
        penetration: &PenetrationResult,
    ) -> Result<(), DeclineReason> {
        if anchor.point.coords.norm() < self.config.origin_epsilon {
            tracing::warn!(host = %penetration.candidate.id, "Placement point at world origin");
            return Err(DeclineReason::PlacementAtOrigin);
        }
        let drift = (anchor.point - penetration.point).norm();
        let limit = anchor.depth / 2.0 + self.config.placement_epsilon;
        if drift > limit {
            tracing::warn!(
                host = %penetration.candidate.id,
                drift,
                limit,
                "Placement point drifted from the penetration"
            );
            return Err(DeclineReason::PlacementTooFar);
        }
        Ok(())
    }
}

/// Wall-family sleeves face X by default
fn facing_rotation(orientation: HostOrientation) -> f64 {
    match orientation {
        HostOrientation::Y => FRAC_PI_2,
        _ => 0.0,
    }
}

/// Highest level at or below `elevation`, else the nearest one within
/// `search_range`. Ties go to the lower id.
pub fn choose_level(levels: &[Level], elevation: f64, search_range: f64) -> Option<&Level> {
    let below = levels
        .iter()
        .filter(|l| l.elevation <= elevation + LEVEL_ELEVATION_SLACK)
        .max_by(|a, b| a.elevation.total_cmp(&b.elevation).then(b.id.cmp(&a.id)));
    if below.is_some() {
        return below;
    }
    levels
        .iter()
        .filter(|l| (l.elevation - elevation).abs() <= search_range)
        .min_by(|a, b| {
            (a.elevation - elevation)
                .abs()
                .total_cmp(&(b.elevation - elevation).abs())
                .then(a.id.cmp(&b.id))
        })
}

/// Vertical axis through `point`, used to rotate a placed sleeve in place
pub fn vertical_axis(point: Point3<f64>) -> Option<Line3> {
    Line3::new(point, point + Vector3::z()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{collect_mep, collect_structural};
    use crate::host::classify_host;
    use crate::intersection::IntersectionEngine;
    use crate::memory::InMemoryModel;
    use crate::model::{Category, CrossSection, ElementId, MepCurve};
    use crate::provider::ModelProvider;
    use approx::assert_relative_eq;
    use mep_sleeve_geometry::BoundingBox;

    fn line(a: (f64, f64, f64), b: (f64, f64, f64)) -> Line3 {
        Line3::new(Point3::new(a.0, a.1, a.2), Point3::new(b.0, b.1, b.2)).unwrap()
    }

    /// Resolve the first penetration of the first run of `category`
    fn resolve_first(
        model: &InMemoryModel,
        category: Category,
        resolver: &PlacementResolver,
    ) -> Result<PlacementSpec, DeclineReason> {
        let config = resolver.config();
        let candidates = collect_structural(model, &Category::STRUCTURAL, None);
        let segment = collect_mep(model, category, None).remove(0);
        let report =
            IntersectionEngine::new(config).find_intersections(model, &segment, &candidates);
        let penetration = report.results.first().expect("expected a penetration");
        let host = classify_host(model, &penetration.candidate, config)?;
        let levels = model.levels(model.host_document());
        resolver.resolve(&segment, penetration, &host, &levels)
    }

    fn wall_model(duct_end_x: f64) -> InMemoryModel {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        model.add_level(host, 0.0);
        model.add_wall(host, line((5.0, -5.0, 0.0), (5.0, 5.0, 0.0)), 0.2, 4.0).unwrap();
        model.add_mep(
            host,
            Category::Duct,
            line((0.0, 0.0, 3.0), (duct_end_x, 0.0, 3.0)),
            CrossSection::Rectangular { width: 0.3, height: 0.2 },
        );
        model
    }

    #[test]
    fn test_duct_through_wall() {
        let model = wall_model(10.0);
        let resolver = PlacementResolver::new(SleeveConfig::default());
        let spec = resolve_first(&model, Category::Duct, &resolver).unwrap();

        assert_relative_eq!(spec.point, Point3::new(5.0, 0.0, 3.0), epsilon = 1e-9);
        assert_relative_eq!(spec.depth, 0.2);
        assert_relative_eq!(spec.width, 0.4, epsilon = 1e-12);
        assert_relative_eq!(spec.height, 0.3, epsilon = 1e-12);
        assert_eq!(spec.diameter, None);
        assert_eq!(spec.orientation, HostOrientation::X);
        assert_eq!(spec.host_kind, HostKind::Wall);
        assert_eq!(spec.rotation, 0.0);
    }

    #[test]
    fn test_stub_into_wall_declined() {
        let model = wall_model(5.04);
        let resolver = PlacementResolver::new(SleeveConfig::default());
        assert_eq!(
            resolve_first(&model, Category::Duct, &resolver),
            Err(DeclineReason::StubPenetration)
        );
    }

    #[test]
    fn test_wall_along_x_rotates_sleeve() {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        model.add_level(host, 0.0);
        model.add_wall(host, line((-5.0, 5.0, 0.0), (5.0, 5.0, 0.0)), 0.2, 4.0).unwrap();
        model.add_mep(
            host,
            Category::Pipe,
            line((1.0, 0.0, 2.0), (1.0, 10.0, 2.0)),
            CrossSection::Round { diameter: 0.1 },
        );
        let resolver = PlacementResolver::new(SleeveConfig::default());
        let spec = resolve_first(&model, Category::Pipe, &resolver).unwrap();

        assert_eq!(spec.orientation, HostOrientation::Y);
        assert_relative_eq!(spec.rotation, FRAC_PI_2);
        assert_relative_eq!(spec.diameter.unwrap(), 0.2, epsilon = 1e-12);
    }

    fn riser_model(structural: bool, category: Category) -> InMemoryModel {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        model.add_level(host, 0.0);
        model.add_level(host, 3.0);
        let slab = BoundingBox::new(Point3::new(0.0, 0.0, 2.8), Point3::new(10.0, 10.0, 3.0));
        model.add_floor(host, slab, structural).unwrap();
        model.add_mep(
            host,
            category,
            line((4.0, 4.0, 0.5), (4.0, 4.0, 5.5)),
            CrossSection::Round { diameter: 0.15 },
        );
        model
    }

    #[test]
    fn test_duct_in_non_structural_floor_declined() {
        let model = riser_model(false, Category::Duct);
        let resolver = PlacementResolver::new(SleeveConfig::default());
        assert_eq!(
            resolve_first(&model, Category::Duct, &resolver),
            Err(DeclineReason::NonStructuralFloor)
        );
    }

    #[test]
    fn test_pipe_in_non_structural_floor_allowed() {
        let model = riser_model(false, Category::Pipe);
        let resolver = PlacementResolver::new(SleeveConfig::default());
        let spec = resolve_first(&model, Category::Pipe, &resolver).unwrap();
        assert_eq!(spec.orientation, HostOrientation::FloorHosted);
        assert_eq!(spec.host_kind, HostKind::Slab);
        assert_relative_eq!(spec.point, Point3::new(4.0, 4.0, 2.9), epsilon = 1e-9);
        assert_relative_eq!(spec.depth, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_level_below_point_chosen() {
        let model = riser_model(true, Category::Duct);
        let resolver = PlacementResolver::new(SleeveConfig::default());
        let spec = resolve_first(&model, Category::Duct, &resolver).unwrap();
        let levels = model.levels(model.host_document());
        assert_eq!(spec.level, levels[0].id);
    }

    #[test]
    fn test_wide_riser_rotated() {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        model.add_level(host, 0.0);
        let slab = BoundingBox::new(Point3::new(0.0, 0.0, 2.8), Point3::new(10.0, 10.0, 3.0));
        model.add_floor(host, slab, true).unwrap();
        model.add_mep_curve(
            host,
            Category::Duct,
            MepCurve {
                line: line((4.0, 4.0, 0.5), (4.0, 4.0, 5.5)),
                cross_section: CrossSection::Rectangular { width: 0.6, height: 0.3 },
                insulation_thickness: 0.0,
                damper_connected: false,
                wide_axis: Some(Vector3::y()),
            },
        );
        let resolver = PlacementResolver::new(SleeveConfig::default());
        let spec = resolve_first(&model, Category::Duct, &resolver).unwrap();
        assert_relative_eq!(spec.rotation, FRAC_PI_2);
    }

    fn framing_model(pipe: Line3) -> InMemoryModel {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        model.add_level(host, 0.0);
        // Beam along X with its axis on top at z = 3: box y 4.85..5.15, z 2.4..3.0
        model.add_framing(host, line((0.0, 5.0, 3.0), (10.0, 5.0, 3.0)), 0.3, 0.6).unwrap();
        model.add_mep(host, Category::Pipe, pipe, CrossSection::Round { diameter: 0.05 });
        model
    }

    #[test]
    fn test_framing_crossing_projected_to_axis() {
        // Long riser through the beam off its axis: little of it is inside
        let model = framing_model(line((4.0, 4.95, 0.5), (4.0, 4.95, 5.5)));
        let resolver = PlacementResolver::new(SleeveConfig::default());
        let spec = resolve_first(&model, Category::Pipe, &resolver).unwrap();
        assert_relative_eq!(spec.point, Point3::new(4.0, 5.0, 2.7), epsilon = 1e-9);
        assert_relative_eq!(spec.depth, 0.3);
        assert_eq!(spec.orientation, HostOrientation::Y);
        assert_eq!(spec.host_kind, HostKind::Wall);
    }

    #[test]
    fn test_framing_run_mostly_inside_keeps_raw_point() {
        // 0.66 long, 0.6 of it inside the beam box
        let model = framing_model(line((4.0, 4.95, 2.37), (4.0, 4.95, 3.03)));
        let resolver = PlacementResolver::new(SleeveConfig::default());
        let spec = resolve_first(&model, Category::Pipe, &resolver).unwrap();
        assert_relative_eq!(spec.point, Point3::new(4.0, 4.95, 2.7), epsilon = 1e-9);
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let model = wall_model(10.0);
        let resolver = PlacementResolver::new(SleeveConfig::default());
        let first = resolve_first(&model, Category::Duct, &resolver).unwrap();
        let second = resolve_first(&model, Category::Duct, &resolver).unwrap();
        assert_eq!(first.point, second.point);
        assert_eq!(first.width.to_bits(), second.width.to_bits());
        assert_eq!(first.height.to_bits(), second.height.to_bits());
        assert_eq!(first.rotation.to_bits(), second.rotation.to_bits());
    }

    #[test]
    fn test_no_level_declined() {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        model.add_wall(host, line((5.0, -5.0, 0.0), (5.0, 5.0, 0.0)), 0.2, 4.0).unwrap();
        model.add_mep(
            host,
            Category::Duct,
            line((0.0, 0.0, 3.0), (10.0, 0.0, 3.0)),
            CrossSection::Rectangular { width: 0.3, height: 0.2 },
        );
        let resolver = PlacementResolver::new(SleeveConfig::default());
        assert_eq!(resolve_first(&model, Category::Duct, &resolver), Err(DeclineReason::NoLevel));
    }

    #[test]
    fn test_custom_clearance_provider() {
        struct Zero;
        impl ClearanceProvider for Zero {
            fn clearance(&self, _: &MepSegment, _: &HostType) -> f64 {
                0.0
            }
        }
        let model = wall_model(10.0);
        let resolver =
            PlacementResolver::new(SleeveConfig::default()).with_clearance_provider(Zero);
        let spec = resolve_first(&model, Category::Duct, &resolver).unwrap();
        assert_relative_eq!(spec.width, 0.3);
        assert_relative_eq!(spec.height, 0.2);
    }

    #[test]
    fn test_centerline_off_the_wall_body_declined() {
        let model = wall_model(10.0);
        let resolver = PlacementResolver::new(SleeveConfig::default());
        let candidates = collect_structural(&model, &Category::STRUCTURAL, None);
        let segment = collect_mep(&model, Category::Duct, None).remove(0);
        let mut engine = IntersectionEngine::new(resolver.config());
        let report = engine.find_intersections(&model, &segment, &candidates);
        let penetration = &report.results[0];
        let levels = model.levels(model.host_document());

        // Location line half a metre away from the 200 mm solid
        let far = HostType::Wall {
            thickness: 0.2,
            centerline: line((5.5, -5.0, 0.0), (5.5, 5.0, 0.0)),
        };
        assert_eq!(
            resolver.resolve(&segment, penetration, &far, &levels),
            Err(DeclineReason::PlacementTooFar)
        );

        // Within half the thickness plus epsilon it still places
        let near = HostType::Wall {
            thickness: 0.2,
            centerline: line((5.09, -5.0, 0.0), (5.09, 5.0, 0.0)),
        };
        let spec = resolver.resolve(&segment, penetration, &near, &levels).unwrap();
        assert_relative_eq!(spec.point, Point3::new(5.09, 0.0, 3.0), epsilon = 1e-9);
    }

    #[test]
    fn test_zero_size_section_declined() {
        struct NoClearance;
        impl ClearanceProvider for NoClearance {
            fn clearance(&self, _: &MepSegment, _: &HostType) -> f64 {
                0.0
            }
        }
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        model.add_level(host, 0.0);
        model.add_wall(host, line((5.0, -5.0, 0.0), (5.0, 5.0, 0.0)), 0.2, 4.0).unwrap();
        model.add_mep(
            host,
            Category::Duct,
            line((0.0, 0.0, 3.0), (10.0, 0.0, 3.0)),
            CrossSection::Rectangular { width: 0.0, height: 0.2 },
        );

        let resolver =
            PlacementResolver::new(SleeveConfig::default()).with_clearance_provider(NoClearance);
        assert_eq!(
            resolve_first(&model, Category::Duct, &resolver),
            Err(DeclineReason::NonPositiveSize)
        );
        // Default clearance grows it back to a valid sleeve
        let resolver = PlacementResolver::new(SleeveConfig::default());
        let spec = resolve_first(&model, Category::Duct, &resolver).unwrap();
        assert_relative_eq!(spec.width, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_choose_level_rules() {
        let levels = [
            Level { id: ElementId(1), elevation: 0.0 },
            Level { id: ElementId(2), elevation: 3.0 },
            Level { id: ElementId(3), elevation: 6.0 },
        ];
        assert_eq!(choose_level(&levels, 4.5, 50.0).unwrap().id, ElementId(2));
        assert_eq!(choose_level(&levels, 3.0, 50.0).unwrap().id, ElementId(2));
        assert_eq!(choose_level(&levels, -2.0, 50.0).unwrap().id, ElementId(1));
        assert!(choose_level(&levels, -80.0, 50.0).is_none());
        assert!(choose_level(&[], 1.0, 50.0).is_none());
    }

    #[test]
    fn test_origin_point_declined() {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        model.add_level(host, -10.0);
        model.add_wall(host, line((0.0, -5.0, -2.0), (0.0, 5.0, -2.0)), 0.2, 4.0).unwrap();
        model.add_mep(
            host,
            Category::Pipe,
            line((-5.0, 0.0, 0.0), (5.0, 0.0, 0.0)),
            CrossSection::Round { diameter: 0.1 },
        );
        let resolver = PlacementResolver::new(SleeveConfig::default());
        assert_eq!(
            resolve_first(&model, Category::Pipe, &resolver),
            Err(DeclineReason::PlacementAtOrigin)
        );
    }
}
