// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory model provider.
//!
//! Deterministic stand-in for a host CAD model: documents, visible and
//! hidden links, walls, floors, framing, MEP runs, levels, family symbols
//! and sleeve instances, with sub-transactions that really roll back.
//! Used by the tests and by callers that want to dry-run a placement.

use crate::error::{Error, Result};
use crate::model::{
    Category, CrossSection, DocumentId, ElementId, GeometryObject, HostOrientation, Level,
    LinkedDocument, MepCurve, ParameterValue, ParameterWrite, SleeveInstance, StructuralType,
};
use crate::provider::ModelProvider;
use mep_sleeve_geometry::{BoundingBox, Line3, Point3, Solid, Transform, Vector3};
use rustc_hash::{FxHashMap, FxHashSet};

/// Parameters every created sleeve instance exposes
const SLEEVE_PARAMETERS: [&str; 6] = [
    "Depth",
    "Width",
    "Height",
    "Diameter",
    "HostOrientation",
    "MepElementId",
];

#[derive(Debug, Clone, Default)]
struct ElementRecord {
    category: Option<Category>,
    bbox: Option<BoundingBox>,
    geometry: Vec<GeometryObject>,
    location_line: Option<Line3>,
    location_point: Option<Point3<f64>>,
    mep: Option<MepCurve>,
    type_id: Option<ElementId>,
    parameters: FxHashMap<String, ParameterValue>,
    family_name: Option<String>,
    rotation: f64,
}

#[derive(Debug, Clone, Default)]
struct DocumentRecord {
    elements: FxHashMap<ElementId, ElementRecord>,
    order: Vec<ElementId>,
    levels: Vec<Level>,
    links: Vec<LinkedDocument>,
}

/// In-memory host model with linked documents
#[derive(Debug, Clone)]
pub struct InMemoryModel {
    host: DocumentId,
    documents: FxHashMap<DocumentId, DocumentRecord>,
    /// Symbol id -> family name, host document only
    symbols: FxHashMap<ElementId, String>,
    next_element: u64,
    next_document: u32,
    snapshot: Option<(DocumentRecord, u64)>,
    failing_geometry: FxHashSet<(DocumentId, ElementId)>,
    failing_commits: usize,
    failing_rotations: usize,
    regenerations: usize,
}

impl InMemoryModel {
    /// Create a model with an empty host document
    pub fn new() -> Self {
        let host = DocumentId(0);
        let mut documents = FxHashMap::default();
        documents.insert(host, DocumentRecord::default());
        Self {
            host,
            documents,
            symbols: FxHashMap::default(),
            next_element: 1,
            next_document: 1,
            snapshot: None,
            failing_geometry: FxHashSet::default(),
            failing_commits: 0,
            failing_rotations: 0,
            regenerations: 0,
        }
    }

    /// Add an empty document that can be linked into the host
    pub fn add_document(&mut self) -> DocumentId {
        let id = DocumentId(self.next_document);
        self.next_document += 1;
        self.documents.insert(id, DocumentRecord::default());
        id
    }

    /// Place `document` in the host with a link -> host transform
    pub fn link_document(&mut self, document: DocumentId, transform: Transform, visible: bool) {
        let host = self.host;
        self.doc_mut(host).links.push(LinkedDocument {
            document,
            transform,
            visible,
        });
    }

    /// Add a level datum
    pub fn add_level(&mut self, document: DocumentId, elevation: f64) -> ElementId {
        let id = self.allocate();
        self.doc_mut(document).levels.push(Level { id, elevation });
        id
    }

    /// Load a family symbol into the host document
    pub fn add_family_symbol(&mut self, family_name: &str) -> ElementId {
        let id = self.allocate();
        self.symbols.insert(id, family_name.to_string());
        id
    }

    /// Add a straight wall. `centerline` sits at the wall base.
    pub fn add_wall(
        &mut self,
        document: DocumentId,
        centerline: Line3,
        thickness: f64,
        height: f64,
    ) -> Result<ElementId> {
        let along = centerline.end - centerline.start;
        let x_axis = Vector3::new(along.x, along.y, 0.0).normalize();
        let y_axis = Vector3::z().cross(&x_axis);
        let mid = centerline.midpoint();
        let placement = Transform::from_axes(
            Point3::new(mid.x, mid.y, mid.z + height / 2.0),
            x_axis,
            y_axis,
            Vector3::z(),
        );
        let solid = Solid::oriented_box(
            &placement,
            Vector3::new(centerline.length() / 2.0, thickness / 2.0, height / 2.0),
        )?;

        let type_id = self.add_type(document, &[("Width", ParameterValue::Double(thickness))]);
        let mut record = solid_record(Category::Wall, solid);
        record.location_line = Some(centerline);
        record.type_id = Some(type_id);
        record
            .parameters
            .insert("Thickness".into(), ParameterValue::Double(thickness));
        Ok(self.insert(document, record))
    }

    /// Add a slab occupying `slab`. Thickness goes on the floor type.
    pub fn add_floor(
        &mut self,
        document: DocumentId,
        slab: BoundingBox,
        structural: bool,
    ) -> Result<ElementId> {
        let solid = Solid::from_box(&slab)?;
        let thickness = slab.max.z - slab.min.z;
        let type_id = self.add_type(document, &[("Thickness", ParameterValue::Double(thickness))]);
        let mut record = solid_record(Category::Floor, solid);
        record.type_id = Some(type_id);
        record
            .parameters
            .insert("Structural".into(), ParameterValue::Integer(structural as i64));
        Ok(self.insert(document, record))
    }

    /// Add a beam whose location line runs along its top face.
    pub fn add_framing(
        &mut self,
        document: DocumentId,
        axis: Line3,
        width: f64,
        depth: f64,
    ) -> Result<ElementId> {
        let along = axis.end - axis.start;
        let x_axis = Vector3::new(along.x, along.y, 0.0).normalize();
        let y_axis = Vector3::z().cross(&x_axis);
        let mid = axis.midpoint();
        let placement = Transform::from_axes(
            Point3::new(mid.x, mid.y, mid.z - depth / 2.0),
            x_axis,
            y_axis,
            Vector3::z(),
        );
        let solid = Solid::oriented_box(
            &placement,
            Vector3::new(axis.length() / 2.0, width / 2.0, depth / 2.0),
        )?;

        let type_id = self.add_type(document, &[("b", ParameterValue::Double(width))]);
        let mut record = solid_record(Category::StructuralFraming, solid);
        record.location_line = Some(axis);
        record.type_id = Some(type_id);
        Ok(self.insert(document, record))
    }

    /// Add an element with an arbitrary geometry tree and explicit bounds
    pub fn add_element(
        &mut self,
        document: DocumentId,
        category: Category,
        geometry: Vec<GeometryObject>,
        bbox: BoundingBox,
    ) -> ElementId {
        let record = ElementRecord {
            category: Some(category),
            bbox: Some(bbox),
            geometry,
            ..Default::default()
        };
        self.insert(document, record)
    }

    /// Add a bare MEP run
    pub fn add_mep(
        &mut self,
        document: DocumentId,
        category: Category,
        line: Line3,
        cross_section: CrossSection,
    ) -> ElementId {
        self.add_mep_curve(
            document,
            category,
            MepCurve {
                line,
                cross_section,
                insulation_thickness: 0.0,
                damper_connected: false,
                wide_axis: None,
            },
        )
    }

    /// Add an MEP run with full curve data
    pub fn add_mep_curve(
        &mut self,
        document: DocumentId,
        category: Category,
        curve: MepCurve,
    ) -> ElementId {
        let half = curve.cross_section.width().max(curve.cross_section.height()) / 2.0;
        let record = ElementRecord {
            category: Some(category),
            bbox: Some(curve.line.bounds().expanded(half)),
            location_line: Some(curve.line),
            mep: Some(curve),
            ..Default::default()
        };
        self.insert(document, record)
    }

    /// Add an existing sleeve or cluster opening instance
    pub fn add_sleeve(
        &mut self,
        document: DocumentId,
        family_name: &str,
        location: Point3<f64>,
        bbox: BoundingBox,
    ) -> ElementId {
        let record = ElementRecord {
            bbox: Some(bbox),
            location_point: Some(location),
            family_name: Some(family_name.to_string()),
            ..Default::default()
        };
        self.insert(document, record)
    }

    /// Set or replace a parameter on any element (types included)
    pub fn set_element_parameter(
        &mut self,
        document: DocumentId,
        element: ElementId,
        name: &str,
        value: ParameterValue,
    ) -> Result<()> {
        let record = self
            .doc_mut(document)
            .elements
            .get_mut(&element)
            .ok_or(Error::MissingElement(element))?;
        record.parameters.insert(name.to_string(), value);
        Ok(())
    }

    /// Remove a parameter from any element (types included)
    pub fn remove_element_parameter(
        &mut self,
        document: DocumentId,
        element: ElementId,
        name: &str,
    ) {
        if let Some(record) = self.doc_mut(document).elements.get_mut(&element) {
            record.parameters.remove(name);
        }
    }

    /// Make geometry extraction of an element fail
    pub fn fail_geometry_for(&mut self, document: DocumentId, element: ElementId) {
        self.failing_geometry.insert((document, element));
    }

    /// Make the next `count` sub-transaction commits fail
    pub fn fail_next_commits(&mut self, count: usize) {
        self.failing_commits = count;
    }

    /// Make the next `count` instance rotations fail
    pub fn fail_next_rotations(&mut self, count: usize) {
        self.failing_rotations = count;
    }

    /// Number of `regenerate` calls so far
    pub fn regeneration_count(&self) -> usize {
        self.regenerations
    }

    /// Rotation applied to a host instance so far
    pub fn instance_rotation(&self, instance: ElementId) -> Option<f64> {
        self.host_record(instance).map(|r| r.rotation)
    }

    fn allocate(&mut self) -> ElementId {
        let id = ElementId(self.next_element);
        self.next_element += 1;
        id
    }

    fn add_type(
        &mut self,
        document: DocumentId,
        parameters: &[(&str, ParameterValue)],
    ) -> ElementId {
        let record = ElementRecord {
            parameters: parameters
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
            ..Default::default()
        };
        self.insert(document, record)
    }

    fn insert(&mut self, document: DocumentId, record: ElementRecord) -> ElementId {
        let id = self.allocate();
        let doc = self.doc_mut(document);
        doc.elements.insert(id, record);
        doc.order.push(id);
        id
    }

    fn doc(&self, document: DocumentId) -> Option<&DocumentRecord> {
        self.documents.get(&document)
    }

    fn doc_mut(&mut self, document: DocumentId) -> &mut DocumentRecord {
        self.documents.entry(document).or_default()
    }

    fn record(&self, document: DocumentId, element: ElementId) -> Option<&ElementRecord> {
        self.doc(document)?.elements.get(&element)
    }

    fn host_record(&self, instance: ElementId) -> Option<&ElementRecord> {
        self.record(self.host, instance)
    }

    fn host_record_mut(&mut self, instance: ElementId) -> Result<&mut ElementRecord> {
        let host = self.host;
        self.doc_mut(host)
            .elements
            .get_mut(&instance)
            .ok_or(Error::MissingElement(instance))
    }

    fn require_transaction(&self) -> Result<()> {
        if self.snapshot.is_none() {
            return Err(Error::Transaction("no open sub-transaction".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryModel {
    fn default() -> Self {
        Self::new()
    }
}

fn solid_record(category: Category, solid: Solid) -> ElementRecord {
    ElementRecord {
        category: Some(category),
        bbox: solid.bounds(),
        geometry: vec![GeometryObject::Solid(solid)],
        ..Default::default()
    }
}

/// Bounds of a created sleeve from its size parameters and rotation.
///
/// Wall sleeves run their depth along local X, slab sleeves along Z.
fn sleeve_bounds(record: &ElementRecord, location: Point3<f64>) -> BoundingBox {
    let param = |name: &str| {
        record
            .parameters
            .get(name)
            .and_then(ParameterValue::as_f64)
            .unwrap_or(0.0)
    };
    let diameter = param("Diameter");
    let width = if diameter > 0.0 { diameter } else { param("Width") };
    let height = if diameter > 0.0 { diameter } else { param("Height") };
    let depth = param("Depth");
    let floor_hosted = matches!(
        record.parameters.get("HostOrientation"),
        Some(ParameterValue::Text(t)) if t == HostOrientation::FloorHosted.as_str()
    );

    let half = if floor_hosted {
        Vector3::new(width, height, depth) / 2.0
    } else {
        Vector3::new(depth, width, height) / 2.0
    };
    let local = BoundingBox::new(Point3::from(-half), Point3::from(half));
    let placement = Transform::rotation_z(Point3::origin(), record.rotation)
        .then(&Transform::translation(location.x, location.y, location.z));
    local.transformed(&placement)
}

impl ModelProvider for InMemoryModel {
    fn host_document(&self) -> DocumentId {
        self.host
    }

    fn elements_by_category(&self, document: DocumentId, category: Category) -> Vec<ElementId> {
        let Some(doc) = self.doc(document) else {
            return Vec::new();
        };
        doc.order
            .iter()
            .filter(|id| {
                doc.elements
                    .get(id)
                    .is_some_and(|r| r.category == Some(category))
            })
            .copied()
            .collect()
    }

    fn linked_documents(&self, host: DocumentId) -> Vec<LinkedDocument> {
        self.doc(host).map(|d| d.links.clone()).unwrap_or_default()
    }

    fn geometry(&self, document: DocumentId, element: ElementId) -> Result<Vec<GeometryObject>> {
        if self.failing_geometry.contains(&(document, element)) {
            return Err(Error::Provider(format!(
                "geometry extraction failed for element {element}"
            )));
        }
        self.record(document, element)
            .map(|r| r.geometry.clone())
            .ok_or(Error::MissingElement(element))
    }

    fn bounding_box(&self, document: DocumentId, element: ElementId) -> Option<BoundingBox> {
        self.record(document, element)?.bbox
    }

    fn location_line(&self, document: DocumentId, element: ElementId) -> Option<Line3> {
        self.record(document, element)?.location_line
    }

    fn mep_curve(&self, document: DocumentId, element: ElementId) -> Option<MepCurve> {
        self.record(document, element)?.mep.clone()
    }

    fn element_type(&self, document: DocumentId, element: ElementId) -> Option<ElementId> {
        self.record(document, element)?.type_id
    }

    fn lookup_parameter(
        &self,
        document: DocumentId,
        element: ElementId,
        name: &str,
    ) -> Option<ParameterValue> {
        self.record(document, element)?.parameters.get(name).cloned()
    }

    fn levels(&self, document: DocumentId) -> Vec<Level> {
        self.doc(document).map(|d| d.levels.clone()).unwrap_or_default()
    }

    fn sleeve_instances(&self, document: DocumentId) -> Vec<SleeveInstance> {
        let Some(doc) = self.doc(document) else {
            return Vec::new();
        };
        doc.order
            .iter()
            .filter_map(|id| {
                let record = doc.elements.get(id)?;
                let family_name = record.family_name.clone()?;
                let location = record.location_point?;
                Some(SleeveInstance {
                    id: *id,
                    family_name,
                    location,
                    bbox: record
                        .bbox
                        .unwrap_or_else(|| BoundingBox::new(location, location)),
                })
            })
            .collect()
    }

    fn find_family_symbol(&self, family_name: &str) -> Option<ElementId> {
        let mut matches: Vec<_> = self
            .symbols
            .iter()
            .filter(|(_, name)| name.as_str() == family_name)
            .map(|(id, _)| *id)
            .collect();
        matches.sort();
        matches.first().copied()
    }

    fn create_family_instance(
        &mut self,
        point: Point3<f64>,
        symbol: ElementId,
        level: ElementId,
        _structural_type: StructuralType,
    ) -> Result<ElementId> {
        self.require_transaction()?;
        let family_name = self
            .symbols
            .get(&symbol)
            .cloned()
            .ok_or(Error::MissingElement(symbol))?;
        let host = self.host;
        if !self.doc(host).is_some_and(|d| d.levels.iter().any(|l| l.id == level)) {
            return Err(Error::MissingElement(level));
        }

        let mut parameters: FxHashMap<String, ParameterValue> = SLEEVE_PARAMETERS
            .iter()
            .map(|name| (name.to_string(), ParameterValue::Double(0.0)))
            .collect();
        parameters.insert(
            "HostOrientation".into(),
            ParameterValue::Text(HostOrientation::Unknown.as_str().into()),
        );
        let record = ElementRecord {
            location_point: Some(point),
            family_name: Some(family_name),
            parameters,
            ..Default::default()
        };
        Ok(self.insert(host, record))
    }

    fn delete_element(&mut self, instance: ElementId) -> Result<()> {
        self.require_transaction()?;
        let host = self.host;
        let doc = self.doc_mut(host);
        if doc.elements.remove(&instance).is_none() {
            return Err(Error::MissingElement(instance));
        }
        doc.order.retain(|id| *id != instance);
        Ok(())
    }

    fn rotate_element(&mut self, instance: ElementId, axis: &Line3, angle: f64) -> Result<()> {
        self.require_transaction()?;
        if self.failing_rotations > 0 {
            self.failing_rotations -= 1;
            return Err(Error::Provider("rotation rejected by host".into()));
        }
        if axis.angle_from_vertical() > 1e-9 {
            return Err(Error::Provider("only vertical rotation axes are supported".into()));
        }
        let record = self.host_record_mut(instance)?;
        let pivot = axis.start;
        if let Some(location) = record.location_point {
            record.location_point =
                Some(Transform::rotation_z(pivot, angle).apply_point(&location));
        }
        record.rotation += angle;
        Ok(())
    }

    fn set_parameter(
        &mut self,
        instance: ElementId,
        name: &str,
        value: ParameterValue,
    ) -> ParameterWrite {
        if self.require_transaction().is_err() {
            return ParameterWrite::NotFoundOrReadOnly;
        }
        match self.host_record_mut(instance) {
            Ok(record) if record.parameters.contains_key(name) => {
                record.parameters.insert(name.to_string(), value);
                ParameterWrite::Written
            }
            _ => ParameterWrite::NotFoundOrReadOnly,
        }
    }

    fn location_point(&self, instance: ElementId) -> Option<Point3<f64>> {
        self.host_record(instance)?.location_point
    }

    fn regenerate(&mut self) -> Result<()> {
        self.regenerations += 1;
        let host = self.host;
        for record in self.doc_mut(host).elements.values_mut() {
            let is_created_sleeve = record.family_name.is_some()
                && record.parameters.contains_key("MepElementId");
            if let (true, Some(location)) = (is_created_sleeve, record.location_point) {
                record.bbox = Some(sleeve_bounds(record, location));
            }
        }
        Ok(())
    }

    fn begin_sub_transaction(&mut self, name: &str) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(Error::Transaction(format!(
                "cannot start '{name}': a sub-transaction is already open"
            )));
        }
        let host = self.host;
        let record = self.doc(host).cloned().unwrap_or_default();
        self.snapshot = Some((record, self.next_element));
        Ok(())
    }

    fn commit_sub_transaction(&mut self) -> Result<()> {
        self.require_transaction()?;
        if self.failing_commits > 0 {
            self.failing_commits -= 1;
            return Err(Error::Transaction("commit rejected by host".into()));
        }
        self.snapshot = None;
        Ok(())
    }

    fn rollback_sub_transaction(&mut self) {
        if let Some((record, next_element)) = self.snapshot.take() {
            let host = self.host;
            self.documents.insert(host, record);
            self.next_element = next_element;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(a: (f64, f64, f64), b: (f64, f64, f64)) -> Line3 {
        Line3::new(Point3::new(a.0, a.1, a.2), Point3::new(b.0, b.1, b.2)).unwrap()
    }

    #[test]
    fn test_wall_bounds_and_thickness() {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        let wall = model
            .add_wall(host, line((5.0, -5.0, 0.0), (5.0, 5.0, 0.0)), 0.2, 4.0)
            .unwrap();

        let bbox = model.bounding_box(host, wall).unwrap();
        assert!((bbox.min.x - 4.9).abs() < 1e-9);
        assert!((bbox.max.x - 5.1).abs() < 1e-9);
        assert!((bbox.max.z - 4.0).abs() < 1e-9);
        assert_eq!(
            model.lookup_parameter(host, wall, "Thickness"),
            Some(ParameterValue::Double(0.2))
        );
        assert_eq!(model.elements_by_category(host, Category::Wall), vec![wall]);
    }

    #[test]
    fn test_rollback_discards_instances() {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        let level = model.add_level(host, 0.0);
        let symbol = model.add_family_symbol("SleeveRoundOnWall");

        model.begin_sub_transaction("batch").unwrap();
        model
            .create_family_instance(
                Point3::new(1.0, 0.0, 0.0),
                symbol,
                level,
                StructuralType::NonStructural,
            )
            .unwrap();
        assert_eq!(model.sleeve_instances(host).len(), 1);
        model.rollback_sub_transaction();

        assert!(model.sleeve_instances(host).is_empty());
    }

    #[test]
    fn test_create_requires_transaction() {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        let level = model.add_level(host, 0.0);
        let symbol = model.add_family_symbol("SleeveRoundOnWall");
        let result = model.create_family_instance(
            Point3::origin(),
            symbol,
            level,
            StructuralType::NonStructural,
        );
        assert!(matches!(result, Err(Error::Transaction(_))));
    }

    #[test]
    fn test_unknown_parameter_not_written() {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        let level = model.add_level(host, 0.0);
        let symbol = model.add_family_symbol("SleeveRoundOnWall");
        model.begin_sub_transaction("batch").unwrap();
        let id = model
            .create_family_instance(
                Point3::new(1.0, 0.0, 0.0),
                symbol,
                level,
                StructuralType::NonStructural,
            )
            .unwrap();

        assert_eq!(
            model.set_parameter(id, "Depth", ParameterValue::Double(0.2)),
            ParameterWrite::Written
        );
        assert_eq!(
            model.set_parameter(id, "Colour", ParameterValue::Text("red".into())),
            ParameterWrite::NotFoundOrReadOnly
        );
    }

    #[test]
    fn test_delete_removes_instance() {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        let level = model.add_level(host, 0.0);
        let symbol = model.add_family_symbol("SleeveRoundOnWall");
        model.begin_sub_transaction("batch").unwrap();
        let id = model
            .create_family_instance(
                Point3::new(1.0, 0.0, 0.0),
                symbol,
                level,
                StructuralType::NonStructural,
            )
            .unwrap();

        model.delete_element(id).unwrap();
        assert!(model.sleeve_instances(host).is_empty());
        assert!(matches!(model.delete_element(id), Err(Error::MissingElement(_))));
    }

    #[test]
    fn test_rotate_about_own_location_keeps_point() {
        let mut model = InMemoryModel::new();
        let host = model.host_document();
        let level = model.add_level(host, 0.0);
        let symbol = model.add_family_symbol("SleeveRoundOnWall");
        model.begin_sub_transaction("batch").unwrap();
        let p = Point3::new(2.0, 3.0, 1.0);
        let id = model
            .create_family_instance(p, symbol, level, StructuralType::NonStructural)
            .unwrap();
        let axis = Line3::new(p, p + Vector3::z()).unwrap();
        model.rotate_element(id, &axis, std::f64::consts::FRAC_PI_2).unwrap();

        let moved = model.location_point(id).unwrap();
        assert!((moved - p).norm() < 1e-9);
        assert_eq!(model.instance_rotation(id), Some(std::f64::consts::FRAC_PI_2));
    }
}
