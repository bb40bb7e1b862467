// ********* Data model shared by every stage ***********

use std::fmt::Display;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

use crate::classify::ColorBucket;
use crate::normalize::NormalizedKey;

/// Identifier of a first-level administrative region (1..=16 in Chile).
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u8);

impl Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a boundary came from, ordered by trust: a lower rank wins.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTier {
    LocalFile,
    RemoteDownload,
    MetropolitanRefinement,
    Synthetic,
}

impl SourceTier {
    pub fn rank(self) -> u8 {
        match self {
            SourceTier::LocalFile => 1,
            SourceTier::RemoteDownload => 2,
            SourceTier::MetropolitanRefinement => 3,
            SourceTier::Synthetic => 4,
        }
    }
}

impl Display for SourceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceTier::LocalFile => "local-file",
            SourceTier::RemoteDownload => "remote-download",
            SourceTier::MetropolitanRefinement => "metropolitan-refinement",
            SourceTier::Synthetic => "synthetic",
        };
        write!(f, "{}", s)
    }
}

/// One administrative unit boundary, as produced by the resolver.
#[derive(PartialEq, Debug, Clone)]
pub struct GeographicFeature {
    pub name: String,
    pub region: Option<RegionId>,
    pub geometry: MultiPolygon<f64>,
    pub source: SourceTier,
}

/// One validated row of the electoral input.
///
/// Percentages are always present after validation: either read from the
/// input or derived from the two candidate vote counts.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct ElectoralRecord {
    /// Line of the input file where the row starts (1-based, header is line 1).
    pub line: usize,
    pub unit_name: String,
    pub region: Option<RegionId>,
    /// The raw region text, kept when the region column exists.
    pub region_text: Option<String>,
    pub jara_pct: f64,
    pub kast_pct: f64,
    pub jara_votes: Option<u64>,
    pub kast_votes: Option<u64>,
    pub total_cast: Option<u64>,
    pub blank: Option<u64>,
    pub null: Option<u64>,
    /// True when the percentages were computed from the vote counts.
    pub derived_pct: bool,
}

impl ElectoralRecord {
    pub fn diff_pct(&self) -> f64 {
        self.jara_pct - self.kast_pct
    }

    /// Valid votes: cast minus blank and null when all three are known,
    /// otherwise the sum of the two candidates. None when the counts overflow.
    pub fn valid_votes(&self) -> Option<u64> {
        let spoiled = match (self.blank, self.null) {
            (Some(blank), Some(null)) => blank.checked_add(null),
            _ => None,
        };
        match (self.total_cast, spoiled) {
            (Some(cast), Some(spoiled)) if cast >= spoiled => Some(cast - spoiled),
            _ => match (self.jara_votes, self.kast_votes) {
                (Some(j), Some(k)) => j.checked_add(k),
                _ => None,
            },
        }
    }
}

/// How strongly the two sides of a match agree.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchQuality {
    /// Same name and both sides carried the same region.
    RegionScoped,
    /// Same name, at least one side carried no region.
    NameOnly,
}

/// The atomic unit handed to the renderer: a boundary joined to its result.
#[derive(PartialEq, Debug, Clone)]
pub struct MergedUnit {
    pub key: NormalizedKey,
    /// Display name, taken from the boundary side.
    pub name: String,
    pub region: Option<RegionId>,
    pub geometry: MultiPolygon<f64>,
    pub source: SourceTier,
    pub electoral: ElectoralRecord,
    pub diff_pct: f64,
    pub bucket: ColorBucket,
    pub quality: MatchQuality,
}

/// A lightweight reference to a unit, used by the diagnostics.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct UnitRef {
    pub name: String,
    pub region: Option<RegionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl From<&GeographicFeature> for UnitRef {
    fn from(f: &GeographicFeature) -> Self {
        UnitRef {
            name: f.name.clone(),
            region: f.region,
            source: Some(f.source),
            line: None,
        }
    }
}

impl From<&ElectoralRecord> for UnitRef {
    fn from(r: &ElectoralRecord) -> Self {
        UnitRef {
            name: r.unit_name.clone(),
            region: r.region,
            source: None,
            line: Some(r.line),
        }
    }
}
