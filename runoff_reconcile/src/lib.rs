//! Reconciliation of runoff results by commune with commune boundaries.
//!
//! The pipeline is a straight line:
//!
//! 1. [`ElectoralParser`] turns the raw CSV bytes into validated records.
//! 2. [`Resolver`] produces one boundary per known commune through a chain of
//!    sources that degrades down to synthetic shapes.
//! 3. [`Reconciler`] joins both sides on [`NormalizedKey`].
//! 4. [`Classifier`] puts every merged unit in one of 13 color buckets.
//! 5. [`Aggregator`] folds the merged units into regional summaries.
//!
//! [`reconcile_dataset`] runs all of it. See the [`manual`] for the input formats.

mod aggregate;
mod boundary;
pub mod builder;
mod classify;
mod config;
mod diagnostics;
mod encoding;
mod geojson;
pub mod manual;
pub mod quick_start;
mod normalize;
mod numeric;
mod parser;
mod reconcile;
mod records;
mod synthetic;

use std::collections::BTreeSet;

use log::info;
use snafu::{ResultExt, Snafu};

pub use crate::aggregate::*;
pub use crate::boundary::{
    Fetch, HttpFetch, OfflineFetch, Resolution, ResolveDiagnostics, Resolver, SourceError, Tier,
    TierReport, TierStatus,
};
pub use crate::classify::{Classifier, ClassifyError, ColorBucket, ALL_BUCKETS};
pub use crate::config::*;
pub use crate::diagnostics::*;
pub use crate::encoding::TextEncoding;
pub use crate::normalize::{NormalizedKey, Normalizer};
pub use crate::numeric::NumericError;
pub use crate::parser::{
    ElectoralParser, Field, ParseError, ParseOutput, ParseStats, RejectReason, RejectedRow,
};
pub use crate::reconcile::{AmbiguityKind, AmbiguousMatch, MatchedPair, Reconciler, Reconciliation};
pub use crate::records::*;

#[derive(Debug, Snafu)]
pub enum PipelineError {
    #[snafu(display("the electoral input could not be parsed"))]
    Parse { source: ParseError },
    #[snafu(display("classification failed"))]
    Classify { source: ClassifyError },
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Regions to resolve. None resolves every catalogued region.
    pub scope: Option<BTreeSet<RegionId>>,
    /// Registers every parsed record as a known unit, so that it gets at
    /// least a synthetic geometry.
    pub cover_records: bool,
}

/// Everything produced by one run.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub merged: Vec<MergedUnit>,
    pub summaries: SummaryReport,
    pub diagnostics: DiagnosticsReport,
    pub reconciliation: Reconciliation,
}

/// Runs parse, resolve, reconcile, classify and aggregate.
///
/// Fails only when the input has no usable header or when a merged unit
/// carries a difference outside [-100, 100]. Every other problem ends up in
/// the diagnostics report.
pub fn reconcile_dataset(
    raw_csv: &[u8],
    settings: &Settings,
    resolver: &mut Resolver,
    options: &PipelineOptions,
) -> Result<Outcome, PipelineError> {
    let normalizer = settings.normalizer();
    let classifier = Classifier::new(&settings.classifier).context(ClassifySnafu {})?;

    let parsed = ElectoralParser::new(&settings.parser, &normalizer, &settings.regions)
        .parse(raw_csv)
        .context(ParseSnafu {})?;
    if options.cover_records {
        let added = parsed
            .records
            .iter()
            .filter(|r| resolver.add_known_unit(&r.unit_name, r.region))
            .count();
        info!("reconcile_dataset: {} record names added to the catalog", added);
    }

    let resolution = resolver.resolve(options.scope.as_ref());
    let reconciliation =
        Reconciler::new(&normalizer).reconcile(resolution.features, parsed.records.clone());
    let merged = reconciliation
        .classify(&classifier)
        .context(ClassifySnafu {})?;
    let summaries = Aggregator::new(classifier.tie_band()).report(
        &merged,
        &settings.zones,
        &settings.metro_areas,
        &normalizer,
    );
    let diagnostics = DiagnosticsReport::build(
        &parsed.stats,
        &parsed.rejected,
        &resolution.diagnostics,
        &reconciliation,
    );
    info!(
        "reconcile_dataset: {} merged units, {} regions summarized",
        merged.len(),
        summaries.regions.len()
    );
    Ok(Outcome {
        merged,
        summaries,
        diagnostics,
        reconciliation,
    })
}
