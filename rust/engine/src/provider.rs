// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model provider: the host CAD model as the engine sees it.
//!
//! Read methods are answered in the coordinate space of the document they
//! are asked about; the engine applies link transforms itself. Mutation
//! only ever targets the host document.

use crate::error::Result;
use crate::model::{
    Category, DocumentId, ElementId, GeometryObject, Level, LinkedDocument, MepCurve,
    ParameterValue, ParameterWrite, SleeveInstance, StructuralType,
};
use mep_sleeve_geometry::{BoundingBox, Line3, Point3};

/// Host model access consumed by the placement engine.
///
/// Implemented by host bindings and by [`crate::memory::InMemoryModel`].
pub trait ModelProvider {
    /// The document sleeves are placed into.
    fn host_document(&self) -> DocumentId;

    /// Elements of `category` in `document`, in a stable order.
    fn elements_by_category(&self, document: DocumentId, category: Category) -> Vec<ElementId>;

    /// Linked models placed in `host`, with cumulative transforms.
    fn linked_documents(&self, host: DocumentId) -> Vec<LinkedDocument>;

    /// Geometry tree of an element in its own document space.
    fn geometry(&self, document: DocumentId, element: ElementId) -> Result<Vec<GeometryObject>>;

    /// Bounds of an element in its own document space.
    fn bounding_box(&self, document: DocumentId, element: ElementId) -> Option<BoundingBox>;

    /// Location line of a wall or framing member.
    fn location_line(&self, document: DocumentId, element: ElementId) -> Option<Line3>;

    /// Centerline and section of an MEP curve.
    fn mep_curve(&self, document: DocumentId, element: ElementId) -> Option<MepCurve>;

    /// Type element of an instance.
    fn element_type(&self, document: DocumentId, element: ElementId) -> Option<ElementId>;

    /// Named parameter of an element (instance or type).
    fn lookup_parameter(
        &self,
        document: DocumentId,
        element: ElementId,
        name: &str,
    ) -> Option<ParameterValue>;

    /// Levels of a document.
    fn levels(&self, document: DocumentId) -> Vec<Level>;

    /// Every sleeve or opening family instance in a document.
    fn sleeve_instances(&self, document: DocumentId) -> Vec<SleeveInstance>;

    /// Loaded symbol of a family in the host document.
    fn find_family_symbol(&self, family_name: &str) -> Option<ElementId>;

    /// Place a workplane-based family instance in the host document.
    fn create_family_instance(
        &mut self,
        point: Point3<f64>,
        symbol: ElementId,
        level: ElementId,
        structural_type: StructuralType,
    ) -> Result<ElementId>;

    /// Delete an instance this core created in the open sub-transaction.
    fn delete_element(&mut self, instance: ElementId) -> Result<()>;

    /// Rotate a host-document instance about `axis`.
    fn rotate_element(&mut self, instance: ElementId, axis: &Line3, angle: f64) -> Result<()>;

    /// Write a parameter on a host-document instance.
    fn set_parameter(
        &mut self,
        instance: ElementId,
        name: &str,
        value: ParameterValue,
    ) -> ParameterWrite;

    /// Location point of a host-document instance.
    fn location_point(&self, instance: ElementId) -> Option<Point3<f64>>;

    /// Flush deferred geometry updates. Required after parameter writes and
    /// before reading instance geometry or location back.
    fn regenerate(&mut self) -> Result<()>;

    /// Open a sub-transaction for one batch.
    fn begin_sub_transaction(&mut self, name: &str) -> Result<()>;

    /// Commit the open sub-transaction.
    fn commit_sub_transaction(&mut self) -> Result<()>;

    /// Discard everything done since the sub-transaction began.
    fn rollback_sub_transaction(&mut self);
}
