// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural and MEP collectors.
//!
//! Both produce snapshots in host coordinates, paired with the transform
//! of the document they came from. Read-only with respect to the model.

use crate::enumerator::VisibleElementEnumerator;
use crate::model::{Category, MepSegment, StructuralCandidate};
use crate::provider::ModelProvider;
use mep_sleeve_geometry::{BoundingBox, Line3};

/// Gather structural hosts of `categories` from the host and visible links.
pub fn collect_structural<P: ModelProvider + ?Sized>(
    provider: &P,
    categories: &[Category],
    section_box: Option<BoundingBox>,
) -> Vec<StructuralCandidate> {
    let candidates: Vec<StructuralCandidate> = VisibleElementEnumerator::new(provider, section_box)
        .enumerate(categories)
        .into_iter()
        .filter_map(|element| {
            let Some(bbox) = element.world_bbox() else {
                tracing::debug!(
                    element = %element.id,
                    "Structural element has no bounding box, skipped"
                );
                return None;
            };
            Some(StructuralCandidate {
                id: element.id,
                document: element.document,
                category: element.category,
                bbox,
                transform: element.transform,
            })
        })
        .collect();

    tracing::info!(count = candidates.len(), "Collected structural candidates");
    candidates
}

/// Gather MEP runs of `category` from the host and visible links.
///
/// Zero-length runs are dropped here so they never reach intersection.
pub fn collect_mep<P: ModelProvider + ?Sized>(
    provider: &P,
    category: Category,
    section_box: Option<BoundingBox>,
) -> Vec<MepSegment> {
    let segments: Vec<MepSegment> = VisibleElementEnumerator::new(provider, section_box)
        .enumerate(&[category])
        .into_iter()
        .filter_map(|element| {
            let Some(curve) = provider.mep_curve(element.document, element.id) else {
                tracing::debug!(element = %element.id, "MEP element has no curve, skipped");
                return None;
            };
            let moved = curve.line.transformed(&element.transform);
            let line = match Line3::new(moved.start, moved.end) {
                Ok(line) => line,
                Err(err) => {
                    tracing::debug!(
                        element = %element.id,
                        error = %err,
                        "Degenerate MEP curve, skipped"
                    );
                    return None;
                }
            };
            Some(MepSegment {
                id: element.id,
                document: element.document,
                category,
                line,
                cross_section: curve.cross_section,
                transform: element.transform,
                insulation_thickness: curve.insulation_thickness,
                damper_connected: curve.damper_connected,
                wide_axis: curve
                    .wide_axis
                    .and_then(|axis| element.transform.apply_vector(&axis).try_normalize(1e-12)),
            })
        })
        .collect();

    tracing::info!(category = ?category, count = segments.len(), "Collected MEP segments");
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryModel;
    use crate::model::CrossSection;
    use approx::assert_relative_eq;
    use mep_sleeve_geometry::{Point3, Transform};

    fn line(a: (f64, f64, f64), b: (f64, f64, f64)) -> Line3 {
        Line3::new(Point3::new(a.0, a.1, a.2), Point3::new(b.0, b.1, b.2)).unwrap()
    }

    #[test]
    fn test_structural_from_host_and_link() {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        let link = model.add_document();
        model.link_document(link, Transform::translation(0.0, 20.0, 0.0), true);
        model.add_wall(host, line((5.0, -5.0, 0.0), (5.0, 5.0, 0.0)), 0.2, 4.0).unwrap();
        model
            .add_floor(
                link,
                BoundingBox::new(Point3::new(0.0, 0.0, 2.8), Point3::new(10.0, 10.0, 3.0)),
                true,
            )
            .unwrap();

        let candidates = collect_structural(&model, &Category::STRUCTURAL, None);
        assert_eq!(candidates.len(), 2);
        let floor = candidates.iter().find(|c| c.category == Category::Floor).unwrap();
        assert_eq!(floor.document, link);
        assert_relative_eq!(floor.bbox.min.y, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mep_line_moved_into_host_space() {
        let mut model = InMemoryModel::new();
        let link = model.add_document();
        model.link_document(link, Transform::translation(1.0, 2.0, 3.0), true);
        model.add_mep(
            link,
            Category::Duct,
            line((0.0, 0.0, 0.0), (4.0, 0.0, 0.0)),
            CrossSection::Rectangular { width: 0.3, height: 0.2 },
        );
        model.add_mep(
            link,
            Category::Pipe,
            line((0.0, 0.0, 0.0), (0.0, 4.0, 0.0)),
            CrossSection::Round { diameter: 0.1 },
        );

        let ducts = collect_mep(&model, Category::Duct, None);
        assert_eq!(ducts.len(), 1);
        assert_relative_eq!(ducts[0].line.start, Point3::new(1.0, 2.0, 3.0), epsilon = 1e-12);
        assert_relative_eq!(ducts[0].line.end, Point3::new(5.0, 2.0, 3.0), epsilon = 1e-12);
        assert_eq!(ducts[0].transform, Transform::translation(1.0, 2.0, 3.0));
    }
}
