// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Representative solid cache for structural candidates.
//!
//! Owned by one placement pass. Keyed by element and the fingerprint of the
//! transform baked into the cached solid, so the same linked wall placed
//! twice gets two entries. Cleared explicitly between passes.

use crate::error::Result;
use crate::model::{DocumentId, ElementId, GeometryObject, StructuralCandidate};
use crate::provider::ModelProvider;
use mep_sleeve_geometry::Solid;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Solids at or below this volume are treated as degenerate
const MIN_SOLID_VOLUME: f64 = 1e-9;

/// Cache key: element plus transform fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SolidKey {
    pub document: DocumentId,
    pub element: ElementId,
    pub transform: u64,
}

impl SolidKey {
    pub fn for_candidate(candidate: &StructuralCandidate) -> Self {
        Self {
            document: candidate.document,
            element: candidate.id,
            transform: candidate.transform.fingerprint(),
        }
    }
}

/// Host-space representative solids, `None` when an element has none
#[derive(Debug, Default)]
pub struct SolidCache {
    solids: FxHashMap<SolidKey, Option<Arc<Solid>>>,
    hits: usize,
    misses: usize,
}

impl SolidCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached solid of `candidate` in host space, extracting on first use.
    ///
    /// Provider and geometry errors are returned and not cached, so a later
    /// pass may retry.
    pub fn get_or_extract<P: ModelProvider + ?Sized>(
        &mut self,
        provider: &P,
        candidate: &StructuralCandidate,
    ) -> Result<Option<Arc<Solid>>> {
        let key = SolidKey::for_candidate(candidate);
        if let Some(cached) = self.solids.get(&key) {
            self.hits += 1;
            return Ok(cached.clone());
        }
        self.misses += 1;

        let objects = provider.geometry(candidate.document, candidate.id)?;
        let solid = match representative_solid(&objects)? {
            Some(local) => Some(Arc::new(local.transformed(&candidate.transform)?)),
            None => {
                tracing::debug!(
                    element = %candidate.id,
                    "No positive-volume solid in element geometry"
                );
                None
            }
        };
        self.solids.insert(key, solid.clone());
        Ok(solid)
    }

    /// Drop every cached solid. Call between independent passes.
    pub fn clear(&mut self) {
        self.solids.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.solids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solids.is_empty()
    }

    /// (hits, misses) since the last clear
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

/// First positive-volume solid directly in `objects`, else the first one
/// inside the first nested instance (moved by that instance's transform).
pub fn representative_solid(objects: &[GeometryObject]) -> Result<Option<Solid>> {
    let direct = objects.iter().find_map(|object| match object {
        GeometryObject::Solid(solid) if solid.volume() > MIN_SOLID_VOLUME => Some(solid),
        _ => None,
    });
    if let Some(solid) = direct {
        return Ok(Some(solid.clone()));
    }

    let nested = objects.iter().find_map(|object| match object {
        GeometryObject::Instance { transform, objects } => Some((transform, objects)),
        GeometryObject::Solid(_) => None,
    });
    let Some((transform, children)) = nested else {
        return Ok(None);
    };
    match children.iter().find_map(|child| match child {
        GeometryObject::Solid(solid) if solid.volume() > MIN_SOLID_VOLUME => Some(solid),
        _ => None,
    }) {
        Some(solid) => Ok(Some(solid.transformed(transform)?)),
        None => Ok(None),
    }
}
