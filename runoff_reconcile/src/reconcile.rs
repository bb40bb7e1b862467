// ********* Joining boundaries and results **********

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info, warn};
use serde::Serialize;

use crate::classify::{Classifier, ClassifyError};
use crate::normalize::{NormalizedKey, Normalizer};
use crate::records::{
    ElectoralRecord, GeographicFeature, MatchQuality, MergedUnit, RegionId, SourceTier, UnitRef,
};

#[derive(PartialEq, Debug, Clone)]
pub struct MatchedPair {
    pub key: NormalizedKey,
    pub feature: GeographicFeature,
    pub record: ElectoralRecord,
    pub quality: MatchQuality,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityKind {
    /// One record, several geometries that the tie-break cannot separate.
    MultipleGeometries,
    /// One geometry claimed by several records.
    MultipleRecords,
}

/// A join that could not be decided. `records` and `features` hold the items
/// this entry accounts for; `candidates` lists everything that was considered.
#[derive(PartialEq, Debug, Clone)]
pub struct AmbiguousMatch {
    pub key: NormalizedKey,
    pub kind: AmbiguityKind,
    pub records: Vec<ElectoralRecord>,
    pub features: Vec<GeographicFeature>,
    pub candidates: Vec<UnitRef>,
}

/// Every input feature and record ends up in exactly one of the four lists.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Reconciliation {
    pub matched: Vec<MatchedPair>,
    pub unmatched_geometry: Vec<GeographicFeature>,
    pub unmatched_electoral: Vec<ElectoralRecord>,
    pub ambiguous: Vec<AmbiguousMatch>,
}

impl Reconciliation {
    pub fn ambiguous_features(&self) -> usize {
        self.ambiguous.iter().map(|a| a.features.len()).sum()
    }

    pub fn ambiguous_records(&self) -> usize {
        self.ambiguous.iter().map(|a| a.records.len()).sum()
    }

    /// Annotates every matched pair with its difference and bucket.
    ///
    /// An out-of-domain difference means the parser let an invalid record
    /// through, and aborts the whole classification.
    pub fn classify(&self, classifier: &Classifier) -> Result<Vec<MergedUnit>, ClassifyError> {
        self.matched
            .iter()
            .map(|p| {
                let diff_pct = p.record.diff_pct();
                let bucket = classifier.classify(diff_pct)?;
                Ok(MergedUnit {
                    key: p.key.clone(),
                    name: p.feature.name.clone(),
                    region: p.feature.region.or(p.record.region),
                    geometry: p.feature.geometry.clone(),
                    source: p.feature.source,
                    electoral: p.record.clone(),
                    diff_pct,
                    bucket,
                    quality: p.quality,
                })
            })
            .collect()
    }
}

// Ambiguity expressed over input indices, materialized at the end.
struct Pending {
    key: NormalizedKey,
    kind: AmbiguityKind,
    records: Vec<usize>,
    features: Vec<usize>,
    candidates: Vec<usize>,
}

enum Choice {
    Nothing,
    One(usize),
    Many(Vec<usize>),
}

pub struct Reconciler<'a> {
    normalizer: &'a Normalizer,
}

impl<'a> Reconciler<'a> {
    pub fn new(normalizer: &'a Normalizer) -> Reconciler<'a> {
        Reconciler { normalizer }
    }

    pub fn reconcile(
        &self,
        features: Vec<GeographicFeature>,
        records: Vec<ElectoralRecord>,
    ) -> Reconciliation {
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (j, f) in features.iter().enumerate() {
            let key = self.normalizer.normalize(&f.name);
            by_name.entry(key.name().to_string()).or_default().push(j);
        }

        let mut proposals: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut pending: Vec<Pending> = Vec::new();
        let mut unmatched_records: Vec<usize> = Vec::new();
        for (i, r) in records.iter().enumerate() {
            let key = self.normalizer.normalize_in(&r.unit_name, r.region);
            let candidates: Vec<usize> = by_name
                .get(key.name())
                .map(|js| {
                    js.iter()
                        .copied()
                        .filter(|j| match (features[*j].region, r.region) {
                            (Some(a), Some(b)) => a == b,
                            _ => true,
                        })
                        .collect()
                })
                .unwrap_or_default();
            match choose(&candidates, r, &features) {
                Choice::Nothing => {
                    debug!("reconcile: no geometry for {}", key);
                    unmatched_records.push(i)
                }
                Choice::One(j) => proposals.entry(j).or_default().push(i),
                Choice::Many(js) => {
                    warn!(
                        "reconcile: {} matches {} geometries, left ambiguous",
                        key,
                        js.len()
                    );
                    pending.push(Pending {
                        key,
                        kind: AmbiguityKind::MultipleGeometries,
                        records: vec![i],
                        features: vec![],
                        candidates: js,
                    });
                }
            }
        }

        let mut pairs: Vec<(usize, usize)> = Vec::new();
        let mut owned: BTreeSet<usize> = BTreeSet::new();
        for (j, rs) in proposals.into_iter() {
            let feature = &features[j];
            if rs.len() == 1 {
                pairs.push((rs[0], j));
                continue;
            }
            let key = self.normalizer.normalize_in(&feature.name, feature.region);
            let scoped: Vec<usize> = rs
                .iter()
                .copied()
                .filter(|i| records[*i].region.is_some() && feature.region.is_some())
                .collect();
            if scoped.len() == 1 {
                debug!("reconcile: {} claimed by {} records, region wins", key, rs.len());
                pairs.push((scoped[0], j));
                pending.push(Pending {
                    key,
                    kind: AmbiguityKind::MultipleRecords,
                    records: rs.into_iter().filter(|i| *i != scoped[0]).collect(),
                    features: vec![],
                    candidates: vec![j],
                });
            } else {
                warn!("reconcile: {} claimed by {} records, left ambiguous", key, rs.len());
                owned.insert(j);
                pending.push(Pending {
                    key,
                    kind: AmbiguityKind::MultipleRecords,
                    records: rs,
                    features: vec![j],
                    candidates: vec![j],
                });
            }
        }

        // Candidate geometries of an undecided record are ambiguous too,
        // unless another record claimed them.
        let matched: BTreeSet<usize> = pairs.iter().map(|(_, j)| *j).collect();
        for p in pending
            .iter_mut()
            .filter(|p| p.kind == AmbiguityKind::MultipleGeometries)
        {
            for j in p.candidates.iter() {
                if !matched.contains(j) && owned.insert(*j) {
                    p.features.push(*j);
                }
            }
        }

        pairs.sort();
        let candidate_refs = |js: &[usize]| -> Vec<UnitRef> {
            js.iter().map(|j| UnitRef::from(&features[*j])).collect()
        };
        let ambiguous_refs: Vec<Vec<UnitRef>> = pending
            .iter()
            .map(|p| {
                let mut refs = candidate_refs(&p.candidates);
                refs.extend(p.records.iter().map(|i| UnitRef::from(&records[*i])));
                refs
            })
            .collect();

        let mut features: Vec<Option<GeographicFeature>> = features.into_iter().map(Some).collect();
        let mut records: Vec<Option<ElectoralRecord>> = records.into_iter().map(Some).collect();

        let mut out = Reconciliation::default();
        for (i, j) in pairs.into_iter() {
            if let (Some(record), Some(feature)) = (records[i].take(), features[j].take()) {
                let quality = match (feature.region, record.region) {
                    (Some(_), Some(_)) => MatchQuality::RegionScoped,
                    _ => MatchQuality::NameOnly,
                };
                let key = self
                    .normalizer
                    .normalize_in(&record.unit_name, feature.region.or(record.region));
                out.matched.push(MatchedPair {
                    key,
                    feature,
                    record,
                    quality,
                });
            }
        }
        for (p, refs) in pending.into_iter().zip(ambiguous_refs.into_iter()) {
            out.ambiguous.push(AmbiguousMatch {
                key: p.key,
                kind: p.kind,
                records: p.records.iter().filter_map(|i| records[*i].take()).collect(),
                features: p.features.iter().filter_map(|j| features[*j].take()).collect(),
                candidates: refs,
            });
        }
        out.unmatched_electoral = unmatched_records
            .iter()
            .filter_map(|i| records[*i].take())
            .collect();
        out.unmatched_geometry = features.into_iter().flatten().collect();

        info!(
            "reconcile: {} matched, {} geometries unmatched, {} records unmatched, {} ambiguous",
            out.matched.len(),
            out.unmatched_geometry.len(),
            out.unmatched_electoral.len(),
            out.ambiguous.len()
        );
        out
    }
}

// Tie-break: most trusted tier first, then the candidate carrying the record's region.
// Tiers are only compared inside one region: a record without region facing
// homonyms from several regions stays ambiguous.
fn choose(candidates: &[usize], record: &ElectoralRecord, features: &[GeographicFeature]) -> Choice {
    match candidates.len() {
        0 => return Choice::Nothing,
        1 => return Choice::One(candidates[0]),
        _ => {}
    }
    if record.region.is_none() {
        let regions: BTreeSet<RegionId> = candidates
            .iter()
            .filter_map(|j| features[*j].region)
            .collect();
        if regions.len() > 1 {
            return Choice::Many(candidates.to_vec());
        }
    }
    let best = candidates
        .iter()
        .map(|j| features[*j].source)
        .min()
        .unwrap_or(SourceTier::Synthetic);
    let top: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|j| features[*j].source == best)
        .collect();
    if top.len() == 1 {
        return Choice::One(top[0]);
    }
    if let Some(region) = record.region {
        let same: Vec<usize> = top
            .iter()
            .copied()
            .filter(|j| features[*j].region == Some(region))
            .collect();
        if same.len() == 1 {
            return Choice::One(same[0]);
        }
    }
    Choice::Many(candidates.to_vec())
}
