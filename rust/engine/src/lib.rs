// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MEP Sleeve Engine
//!
//! Finds where ducts, pipes, cable trays and conduits cross walls, floors
//! and beams, and places a correctly sized and oriented sleeve at each
//! crossing unless one is already there.
//!
//! A pass runs in stages:
//! 1. **Collect**: structural hosts and MEP runs from the host model and
//!    its visible links, in host coordinates
//! 2. **Intersect**: centerline against host solids, through a plan grid
//!    and a per-pass solid cache
//! 3. **Resolve**: per host kind rules for point, depth, size, facing
//! 4. **Suppress**: skip points already covered by a sleeve or cluster
//! 5. **Place**: create, size and rotate the instance, batch by batch
//!
//! The host model is reached only through [`ModelProvider`];
//! [`InMemoryModel`] implements it for tests and dry runs.
//!
//! ```no_run
//! use mep_sleeve_engine::{InMemoryModel, SleeveConfig, SleevePlacer};
//!
//! let mut model = InMemoryModel::new();
//! let mut placer = SleevePlacer::new(SleeveConfig::default())?;
//! let summary = placer.process_all(&mut model);
//! println!("placed {}, skipped {}", summary.placed, summary.skipped);
//! # Ok::<(), mep_sleeve_engine::Error>(())
//! ```

pub mod cache;
pub mod collector;
pub mod config;
pub mod duplicate;
pub mod enumerator;
pub mod error;
pub mod host;
pub mod intersection;
pub mod memory;
pub mod model;
pub mod pipeline;
pub mod placement;
pub mod policy;
pub mod provider;
pub mod spatial;

pub use cache::{representative_solid, SolidCache, SolidKey};
pub use collector::{collect_mep, collect_structural};
pub use config::{ClearanceConfig, SleeveConfig, SleeveFamilies};
pub use duplicate::{is_duplicate, DuplicateSuppressor};
pub use enumerator::{VisibleElement, VisibleElementEnumerator};
pub use error::{DeclineReason, Error, Result};
pub use host::{classify_host, HostType};
pub use intersection::{representative_point, IntersectionEngine, IntersectionReport};
pub use memory::InMemoryModel;
pub use model::{
    Category, CrossSection, DocumentId, ElementId, GeometryObject, HostKind, HostOrientation, Level,
    LinkedDocument, MepCurve, MepSegment, ParameterValue, ParameterWrite, PenetrationResult,
    PlacementSpec, SleeveInstance, SleeveKind, StructuralCandidate, StructuralType,
};
pub use pipeline::{PlacementSummary, SleevePlacer};
pub use placement::{choose_level, PlacementResolver};
pub use policy::{ClearanceProvider, DefaultClearance, FootprintRiserPolicy, RiserRotationPolicy};
pub use provider::ModelProvider;
pub use spatial::{SleeveGrid, StructuralPartition};
