// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Visible element enumeration across the host and its linked models.
//!
//! Composes category filtering, link visibility, section-box culling and
//! transform attachment once, for both the structural and MEP collectors.

use crate::model::{Category, DocumentId, ElementId};
use crate::provider::ModelProvider;
use mep_sleeve_geometry::{BoundingBox, Transform};

/// An element found in the host or a visible link
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleElement {
    pub document: DocumentId,
    pub id: ElementId,
    pub category: Category,
    /// Source document -> host
    pub transform: Transform,
    /// Bounds in the source document's own space
    pub local_bbox: Option<BoundingBox>,
}

impl VisibleElement {
    /// Bounds in host space
    pub fn world_bbox(&self) -> Option<BoundingBox> {
        self.local_bbox.map(|b| b.transformed(&self.transform))
    }
}

/// Walks the host document and every visible link
pub struct VisibleElementEnumerator<'a, P: ModelProvider + ?Sized> {
    provider: &'a P,
    section_box: Option<BoundingBox>,
}

impl<'a, P: ModelProvider + ?Sized> VisibleElementEnumerator<'a, P> {
    /// `section_box` is in host coordinates
    pub fn new(provider: &'a P, section_box: Option<BoundingBox>) -> Self {
        Self {
            provider,
            section_box,
        }
    }

    /// Host document with identity, followed by visible links
    pub fn sources(&self) -> Vec<(DocumentId, Transform)> {
        let host = self.provider.host_document();
        let mut sources = vec![(host, Transform::identity())];
        for link in self.provider.linked_documents(host) {
            if !link.visible {
                tracing::debug!(document = link.document.0, "Skipping hidden link");
                continue;
            }
            sources.push((link.document, link.transform));
        }
        sources
    }

    /// Enumerate elements of `categories`.
    ///
    /// With a section box, elements whose local bounds miss the box (moved
    /// into each link's own space) are dropped. If that drops everything
    /// while there were elements to drop, the filter is assumed broken for
    /// this model and the unfiltered set is returned instead.
    pub fn enumerate(&self, categories: &[Category]) -> Vec<VisibleElement> {
        let mut all = Vec::new();
        let mut inside = Vec::new();

        for (document, transform) in self.sources() {
            let local_section = self.section_box.and_then(|section| {
                match transform.inverse() {
                    Ok(inverse) => Some(section.transformed(&inverse)),
                    Err(err) => {
                        tracing::warn!(
                            document = document.0,
                            error = %err,
                            "Link transform not invertible, section box ignored for link"
                        );
                        None
                    }
                }
            });

            for &category in categories {
                for id in self.provider.elements_by_category(document, category) {
                    let element = VisibleElement {
                        document,
                        id,
                        category,
                        transform,
                        local_bbox: self.provider.bounding_box(document, id),
                    };
                    let keep = match (self.section_box, local_section, element.local_bbox) {
                        (None, _, _) => true,
                        // Section box present but unusable for this link
                        (Some(_), None, _) => true,
                        (Some(_), Some(section), Some(bbox)) => bbox.intersects(&section),
                        (Some(_), Some(_), None) => false,
                    };
                    if keep {
                        inside.push(element);
                    }
                    all.push(element);
                }
            }
        }

        if self.section_box.is_some() && inside.is_empty() && !all.is_empty() {
            tracing::warn!(
                categories = ?categories,
                unfiltered = all.len(),
                "Section box removed every element, falling back to the unfiltered set"
            );
            return all;
        }

        tracing::debug!(
            categories = ?categories,
            kept = inside.len(),
            total = all.len(),
            "Enumerated visible elements"
        );
        inside
    }
}
