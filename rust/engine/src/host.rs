// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host classification.
//!
//! Reads the per-category fields the placement rules need (thickness,
//! centerline, beam axis, structural flag) once, into a tagged variant the
//! resolver matches on exhaustively.

use crate::config::SleeveConfig;
use crate::error::DeclineReason;
use crate::model::{Category, StructuralCandidate};
use crate::provider::ModelProvider;
use mep_sleeve_geometry::{Line3, Vector3};

/// Floor type parameters tried in order for the slab thickness
const FLOOR_THICKNESS_PARAMETERS: [&str; 3] = ["Thickness", "Depth", "Default Thickness"];

/// Structural host with the fields placement needs, in host coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostType {
    Wall { thickness: f64, centerline: Line3 },
    Floor { thickness: f64, structural: bool },
    Framing { width: f64, axis: Line3 },
}

impl HostType {
    /// Thickness a sleeve has to pass through
    pub fn thickness(&self) -> f64 {
        match *self {
            HostType::Wall { thickness, .. } | HostType::Floor { thickness, .. } => thickness,
            HostType::Framing { width, .. } => width,
        }
    }

    /// Horizontal normal of a wall or beam, `None` for floors
    pub fn plan_normal(&self) -> Option<Vector3<f64>> {
        let line = match self {
            HostType::Wall { centerline, .. } => centerline,
            HostType::Framing { axis, .. } => axis,
            HostType::Floor { .. } => return None,
        };
        line.direction().cross(&Vector3::z()).try_normalize(1e-9)
    }
}

/// Classify a candidate and read its placement fields.
pub fn classify_host<P: ModelProvider + ?Sized>(
    provider: &P,
    candidate: &StructuralCandidate,
    config: &SleeveConfig,
) -> Result<HostType, DeclineReason> {
    let document = candidate.document;
    let element = candidate.id;
    let type_id = provider.element_type(document, element);

    let instance_number = |name: &str| {
        provider
            .lookup_parameter(document, element, name)
            .and_then(|v| v.as_f64())
            .filter(|v| *v > 0.0)
    };
    let type_number = |name: &str| {
        type_id
            .and_then(|t| provider.lookup_parameter(document, t, name))
            .and_then(|v| v.as_f64())
            .filter(|v| *v > 0.0)
    };

    match candidate.category {
        Category::Wall => {
            let thickness = instance_number("Thickness")
                .or_else(|| type_number("Width"))
                .ok_or_else(|| {
                    tracing::warn!(host = %element, "Wall has neither Thickness nor Width");
                    DeclineReason::UnknownHostThickness
                })?;
            let centerline = provider
                .location_line(document, element)
                .ok_or(DeclineReason::UnsupportedHost)?
                .transformed(&candidate.transform);
            Ok(HostType::Wall {
                thickness,
                centerline,
            })
        }
        Category::Floor => {
            let thickness = FLOOR_THICKNESS_PARAMETERS
                .iter()
                .find_map(|name| type_number(name))
                .unwrap_or_else(|| {
                    tracing::warn!(
                        host = %element,
                        default = config.default_floor_thickness,
                        "Floor thickness not found on type, using default"
                    );
                    config.default_floor_thickness
                });
            let structural = provider
                .lookup_parameter(document, element, "Structural")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            Ok(HostType::Floor {
                thickness,
                structural,
            })
        }
        Category::StructuralFraming => {
            let width = type_number("b")
                .or_else(|| instance_number("b"))
                .unwrap_or_else(|| {
                    tracing::warn!(
                        host = %element,
                        default = config.default_framing_width,
                        "Framing width 'b' not found, using default"
                    );
                    config.default_framing_width
                });
            let axis = provider
                .location_line(document, element)
                .ok_or(DeclineReason::UnsupportedHost)?
                .transformed(&candidate.transform);
            Ok(HostType::Framing { width, axis })
        }
        _ => Err(DeclineReason::UnsupportedHost),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::collect_structural;
    use crate::memory::InMemoryModel;
    use crate::model::ParameterValue;
    use mep_sleeve_geometry::{BoundingBox, Point3, Transform};

    fn line(a: (f64, f64, f64), b: (f64, f64, f64)) -> Line3 {
        Line3::new(Point3::new(a.0, a.1, a.2), Point3::new(b.0, b.1, b.2)).unwrap()
    }

    fn only_candidate(model: &InMemoryModel) -> StructuralCandidate {
        collect_structural(model, &Category::STRUCTURAL, None).remove(0)
    }

    #[test]
    fn test_wall_thickness_falls_back_to_type_width() {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        let wall = model
            .add_wall(host, line((5.0, -5.0, 0.0), (5.0, 5.0, 0.0)), 0.25, 4.0)
            .unwrap();
        model.remove_element_parameter(host, wall, "Thickness");

        let host_type =
            classify_host(&model, &only_candidate(&model), &SleeveConfig::default()).unwrap();
        assert_eq!(host_type.thickness(), 0.25);
        let normal = host_type.plan_normal().unwrap();
        assert!((normal.x.abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_floor_thickness_order_and_default() {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        let slab = BoundingBox::new(Point3::new(0.0, 0.0, 2.8), Point3::new(10.0, 10.0, 3.0));
        let floor = model.add_floor(host, slab, true).unwrap();
        let floor_type = model.element_type(host, floor).unwrap();
        model.remove_element_parameter(host, floor_type, "Thickness");
        model
            .set_element_parameter(
                host,
                floor_type,
                "Default Thickness",
                ParameterValue::Double(0.3),
            )
            .unwrap();

        let config = SleeveConfig::default();
        let candidate = only_candidate(&model);
        assert_eq!(classify_host(&model, &candidate, &config).unwrap().thickness(), 0.3);

        model.remove_element_parameter(host, floor_type, "Default Thickness");
        assert_eq!(
            classify_host(&model, &candidate, &config).unwrap(),
            HostType::Floor { thickness: 0.5, structural: true }
        );
    }

    #[test]
    fn test_linked_framing_axis_in_host_space() {
        let mut model = InMemoryModel::new();
        let link = model.add_document();
        model.link_document(link, Transform::translation(0.0, 0.0, 10.0), true);
        model.add_framing(link, line((0.0, 0.0, 3.0), (8.0, 0.0, 3.0)), 0.3, 0.6).unwrap();

        let host_type =
            classify_host(&model, &only_candidate(&model), &SleeveConfig::default()).unwrap();
        match host_type {
            HostType::Framing { width, axis } => {
                assert_eq!(width, 0.3);
                assert!((axis.start.z - 13.0).abs() < 1e-12);
            }
            other => panic!("expected framing, got {other:?}"),
        }
    }

    #[test]
    fn test_non_structural_category_unsupported() {
        let model = InMemoryModel::new();
        let candidate = StructuralCandidate {
            id: crate::model::ElementId(99),
            document: model.host_document(),
            category: Category::Duct,
            bbox: BoundingBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0)),
            transform: Transform::identity(),
        };
        assert_eq!(
            classify_host(&model, &candidate, &SleeveConfig::default()),
            Err(DeclineReason::UnsupportedHost)
        );
    }
}
