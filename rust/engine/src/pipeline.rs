// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placement pass over a whole model.
//!
//! Collects structural hosts once, then walks every MEP category in
//! batches. Each batch runs in its own sub-transaction: a batch whose
//! commit fails is rolled back and counted, and the pass moves on to the
//! next one. Declines and per-element faults are counted, never raised.

use crate::collector::{collect_mep, collect_structural};
use crate::config::SleeveConfig;
use crate::duplicate::DuplicateSuppressor;
use crate::error::{DeclineReason, Result};
use crate::host::classify_host;
use crate::intersection::IntersectionEngine;
use crate::model::{
    Category, ElementId, Level, MepSegment, ParameterValue, ParameterWrite, PenetrationResult,
    PlacementSpec, SleeveInstance, StructuralType,
};
use crate::placement::{vertical_axis, PlacementResolver};
use crate::provider::ModelProvider;
use crate::spatial::StructuralPartition;
use mep_sleeve_geometry::{BoundingBox, Point3};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counts reported back to the caller after a pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementSummary {
    pub placed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub skipped_by_reason: BTreeMap<DeclineReason, usize>,
}

impl PlacementSummary {
    fn skip(&mut self, reason: DeclineReason) {
        self.skipped += 1;
        *self.skipped_by_reason.entry(reason).or_default() += 1;
    }

    fn merge(&mut self, other: PlacementSummary) {
        self.placed += other.placed;
        self.skipped += other.skipped;
        self.errors += other.errors;
        for (reason, count) in other.skipped_by_reason {
            *self.skipped_by_reason.entry(reason).or_default() += count;
        }
    }

    /// Skips recorded for one reason
    pub fn skipped_for(&self, reason: DeclineReason) -> usize {
        self.skipped_by_reason.get(&reason).copied().unwrap_or(0)
    }
}

enum Outcome {
    Placed(ElementId),
    Declined(DeclineReason),
}

/// Indices built once per pass
struct PassContext {
    partition: StructuralPartition,
    duplicates: DuplicateSuppressor,
    levels: Vec<Level>,
}

/// Runs placement passes against a model provider
pub struct SleevePlacer {
    config: SleeveConfig,
    resolver: PlacementResolver,
    engine: IntersectionEngine,
    section_box: Option<BoundingBox>,
    abort: Arc<AtomicBool>,
}

impl SleevePlacer {
    /// Placer with the default resolver policies. Fails on an invalid
    /// configuration.
    pub fn new(config: SleeveConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine: IntersectionEngine::new(&config),
            resolver: PlacementResolver::new(config.clone()),
            config,
            section_box: None,
            abort: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replace the resolver, e.g. to plug in other clearance or riser
    /// policies. The resolver keeps its own configuration.
    pub fn with_resolver(mut self, resolver: PlacementResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Only consider elements whose bounds touch `section_box`
    pub fn with_section_box(mut self, section_box: BoundingBox) -> Self {
        self.section_box = Some(section_box);
        self
    }

    /// Set to `true` to skip the remaining batches. The running batch
    /// still completes.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn config(&self) -> &SleeveConfig {
        &self.config
    }

    /// Drop cached host solids
    pub fn clear_cache(&mut self) {
        self.engine.clear_cache();
    }

    /// Place sleeves for every configured MEP category.
    ///
    /// Starts from an empty solid cache, so consecutive passes never share
    /// geometry.
    pub fn process_all<P: ModelProvider + ?Sized>(&mut self, provider: &mut P) -> PlacementSummary {
        let start = Instant::now();
        self.clear_cache();

        let host = provider.host_document();
        let structural = collect_structural(&*provider, &Category::STRUCTURAL, self.section_box);
        let mut context = PassContext {
            partition: StructuralPartition::build(structural, self.config.structural_cell_size),
            duplicates: DuplicateSuppressor::new(provider.sleeve_instances(host), &self.config),
            levels: provider.levels(host),
        };

        let mut summary = PlacementSummary::default();
        for category in self.config.mep_categories.clone() {
            if self.is_aborted() {
                break;
            }
            let category_summary = self.process_category(provider, category, &mut context);
            summary.merge(category_summary);
        }

        let (hits, misses) = self.engine.cache().stats();
        tracing::info!(
            placed = summary.placed,
            skipped = summary.skipped,
            errors = summary.errors,
            solid_cache_hits = hits,
            solid_cache_misses = misses,
            total_time_ms = start.elapsed().as_millis(),
            "Sleeve placement complete"
        );
        summary
    }

    fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    fn process_category<P: ModelProvider + ?Sized>(
        &mut self,
        provider: &mut P,
        category: Category,
        context: &mut PassContext,
    ) -> PlacementSummary {
        let segments = collect_mep(&*provider, category, self.section_box);
        let mut summary = PlacementSummary::default();

        for (batch_index, batch) in segments.chunks(self.config.batch_size).enumerate() {
            if self.is_aborted() {
                tracing::info!(
                    ?category,
                    batch = batch_index,
                    "Placement aborted, skipping remaining batches"
                );
                break;
            }

            let name = format!("Place {category:?} sleeves, batch {batch_index}");
            if let Err(err) = provider.begin_sub_transaction(&name) {
                tracing::error!(
                    ?category,
                    batch = batch_index,
                    error = %err,
                    "Could not start batch"
                );
                summary.errors += 1;
                continue;
            }

            let checkpoint = context.duplicates.len();
            let mut batch_summary = PlacementSummary::default();
            for segment in batch {
                self.process_segment(provider, segment, context, &mut batch_summary);
            }

            match provider.commit_sub_transaction() {
                Ok(()) => summary.merge(batch_summary),
                Err(err) => {
                    provider.rollback_sub_transaction();
                    context.duplicates.rollback_to(checkpoint);
                    tracing::error!(
                        ?category,
                        batch = batch_index,
                        discarded = batch_summary.placed,
                        error = %err,
                        "Batch rolled back"
                    );
                    // Placements are gone; skips and faults still happened
                    batch_summary.placed = 0;
                    batch_summary.errors += 1;
                    summary.merge(batch_summary);
                }
            }
        }

        tracing::info!(
            ?category,
            segments = segments.len(),
            placed = summary.placed,
            skipped = summary.skipped,
            errors = summary.errors,
            "Category processed"
        );
        summary
    }

    fn process_segment<P: ModelProvider + ?Sized>(
        &mut self,
        provider: &mut P,
        segment: &MepSegment,
        context: &mut PassContext,
        summary: &mut PlacementSummary,
    ) {
        let report = self
            .engine
            .find_in_partition(&*provider, segment, &context.partition);
        summary.errors += report.errors.len();

        for penetration in &report.results {
            match self.place_penetration(provider, segment, penetration, context) {
                Ok(Outcome::Placed(instance)) => {
                    tracing::debug!(
                        segment = %segment.id,
                        host = %penetration.candidate.id,
                        %instance,
                        "Sleeve placed"
                    );
                    summary.placed += 1;
                }
                Ok(Outcome::Declined(reason)) => {
                    tracing::info!(
                        segment = %segment.id,
                        host = %penetration.candidate.id,
                        %reason,
                        "Sleeve skipped"
                    );
                    summary.skip(reason);
                }
                Err(err) => {
                    tracing::warn!(
                        segment = %segment.id,
                        host = %penetration.candidate.id,
                        error = %err,
                        "Sleeve placement failed"
                    );
                    summary.errors += 1;
                }
            }
        }
    }

    fn place_penetration<P: ModelProvider + ?Sized>(
        &mut self,
        provider: &mut P,
        segment: &MepSegment,
        penetration: &PenetrationResult,
        context: &mut PassContext,
    ) -> Result<Outcome> {
        let host = match classify_host(&*provider, &penetration.candidate, &self.config) {
            Ok(host) => host,
            Err(reason) => return Ok(Outcome::Declined(reason)),
        };
        let spec = match self
            .resolver
            .resolve(segment, penetration, &host, &context.levels)
        {
            Ok(spec) => spec,
            Err(reason) => return Ok(Outcome::Declined(reason)),
        };
        if context.duplicates.is_duplicate(&spec.point, Some(spec.host_kind)) {
            return Ok(Outcome::Declined(DeclineReason::Duplicate));
        }

        let family = self
            .config
            .families
            .family_for(spec.host_kind, spec.diameter.is_some())
            .to_string();
        let Some(symbol) = provider.find_family_symbol(&family) else {
            return Ok(Outcome::Declined(DeclineReason::MissingFamilySymbol));
        };

        let instance = provider.create_family_instance(
            spec.point,
            symbol,
            spec.level,
            StructuralType::NonStructural,
        )?;
        let location = match finish_instance(provider, instance, &spec, segment) {
            Ok(location) => location,
            Err(err) => {
                // A half-built sleeve must not stay behind unindexed.
                if let Err(delete_err) = provider.delete_element(instance) {
                    tracing::warn!(
                        %instance,
                        error = %delete_err,
                        "Failed to remove unfinished sleeve"
                    );
                    context.duplicates.record(sleeve_record(instance, family, spec.point, &spec));
                }
                return Err(err);
            }
        };

        context.duplicates.record(sleeve_record(instance, family, location, &spec));
        Ok(Outcome::Placed(instance))
    }
}

/// Size, regenerate and rotate a freshly created sleeve. Returns its
/// final location.
fn finish_instance<P: ModelProvider + ?Sized>(
    provider: &mut P,
    instance: ElementId,
    spec: &PlacementSpec,
    segment: &MepSegment,
) -> Result<Point3<f64>> {
    write_parameters(provider, instance, spec, segment);
    provider.regenerate()?;

    let location = provider.location_point(instance).unwrap_or(spec.point);
    if spec.rotation != 0.0 {
        if let Some(axis) = vertical_axis(location) {
            provider.rotate_element(instance, &axis, spec.rotation)?;
            provider.regenerate()?;
        }
    }
    Ok(location)
}

fn sleeve_record(
    id: ElementId,
    family_name: String,
    location: Point3<f64>,
    spec: &PlacementSpec,
) -> SleeveInstance {
    let extent = spec.depth.max(spec.width).max(spec.height) / 2.0;
    SleeveInstance {
        id,
        family_name,
        location,
        bbox: BoundingBox::new(location, location).expanded(extent),
    }
}

fn write_parameters<P: ModelProvider + ?Sized>(
    provider: &mut P,
    instance: ElementId,
    spec: &PlacementSpec,
    segment: &MepSegment,
) {
    let mut values = vec![("Depth", ParameterValue::Double(spec.depth))];
    match spec.diameter {
        Some(diameter) => values.push(("Diameter", ParameterValue::Double(diameter))),
        None => {
            values.push(("Width", ParameterValue::Double(spec.width)));
            values.push(("Height", ParameterValue::Double(spec.height)));
        }
    }
    values.push((
        "HostOrientation",
        ParameterValue::Text(spec.orientation.as_str().to_string()),
    ));
    match i64::try_from(segment.id.0) {
        Ok(id) => values.push(("MepElementId", ParameterValue::Integer(id))),
        Err(_) => tracing::warn!(segment = %segment.id, "MEP element id does not fit a parameter"),
    }

    for (name, value) in values {
        if provider.set_parameter(instance, name, value) == ParameterWrite::NotFoundOrReadOnly {
            tracing::debug!(%instance, parameter = name, "Sleeve parameter missing or read-only");
        }
    }
}
