// ********* Summary statistics **********

use std::collections::BTreeSet;

use log::{debug, warn};
use serde::Serialize;

use crate::config::{MetroArea, Zone};
use crate::normalize::Normalizer;
use crate::records::{MergedUnit, RegionId};

/// Vote-weighted shares, available when every unit carries vote counts.
#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedShare {
    pub jara_pct: f64,
    pub kast_pct: f64,
    pub valid_votes: u64,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalSummary {
    pub region: RegionId,
    pub unit_count: usize,
    /// None for an empty region.
    pub mean_diff_pct: Option<f64>,
    pub jara_wins: usize,
    pub kast_wins: usize,
    pub ties: usize,
    pub weighted: Option<WeightedShare>,
}

/// Same statistics over a named group of units: a zone, a metropolitan area
/// or the whole country.
#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaSummary {
    pub name: String,
    pub unit_count: usize,
    pub mean_diff_pct: Option<f64>,
    pub jara_wins: usize,
    pub kast_wins: usize,
    pub ties: usize,
    pub weighted: Option<WeightedShare>,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub regions: Vec<RegionalSummary>,
    pub zones: Vec<AreaSummary>,
    pub metro_areas: Vec<AreaSummary>,
    pub national: AreaSummary,
}

#[derive(Default)]
struct Fold {
    count: usize,
    diff_sum: f64,
    jara_wins: usize,
    kast_wins: usize,
    ties: usize,
    jara_votes: u64,
    kast_votes: u64,
    valid_votes: u64,
    complete_votes: bool,
}

impl Fold {
    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.diff_sum / self.count as f64)
        }
    }

    fn weighted(&self) -> Option<WeightedShare> {
        if self.count == 0 || !self.complete_votes || self.valid_votes == 0 {
            return None;
        }
        let valid = self.valid_votes as f64;
        Some(WeightedShare {
            jara_pct: self.jara_votes as f64 * 100.0 / valid,
            kast_pct: self.kast_votes as f64 * 100.0 / valid,
            valid_votes: self.valid_votes,
        })
    }

    fn area(self, name: &str) -> AreaSummary {
        AreaSummary {
            name: name.to_string(),
            unit_count: self.count,
            mean_diff_pct: self.mean(),
            jara_wins: self.jara_wins,
            kast_wins: self.kast_wins,
            ties: self.ties,
            weighted: self.weighted(),
        }
    }
}

/// RegionalAggregator. Wins are counted outside the tie band, ties inside it.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    tie_band: f64,
}

impl Aggregator {
    pub fn new(tie_band: f64) -> Aggregator {
        Aggregator { tie_band }
    }

    fn fold<'u>(&self, units: impl Iterator<Item = &'u MergedUnit>) -> Fold {
        let mut acc = Fold {
            complete_votes: true,
            ..Fold::default()
        };
        for u in units {
            acc.count += 1;
            acc.diff_sum += u.diff_pct;
            if u.diff_pct > self.tie_band {
                acc.jara_wins += 1;
            } else if u.diff_pct < -self.tie_band {
                acc.kast_wins += 1;
            } else {
                acc.ties += 1;
            }
            let e = &u.electoral;
            match (e.jara_votes, e.kast_votes, e.valid_votes()) {
                (Some(j), Some(k), Some(v)) => match (
                    acc.jara_votes.checked_add(j),
                    acc.kast_votes.checked_add(k),
                    acc.valid_votes.checked_add(v),
                ) {
                    (Some(jt), Some(kt), Some(vt)) => {
                        acc.jara_votes = jt;
                        acc.kast_votes = kt;
                        acc.valid_votes = vt;
                    }
                    _ => {
                        warn!("aggregate: vote totals overflow at {}", u.name);
                        acc.complete_votes = false;
                    }
                },
                _ => acc.complete_votes = false,
            }
        }
        acc
    }

    pub fn aggregate(&self, units: &[MergedUnit], region: RegionId) -> RegionalSummary {
        let f = self.fold(units.iter().filter(|u| u.region == Some(region)));
        debug!("aggregate: region {}: {} units", region, f.count);
        RegionalSummary {
            region,
            unit_count: f.count,
            mean_diff_pct: f.mean(),
            jara_wins: f.jara_wins,
            kast_wins: f.kast_wins,
            ties: f.ties,
            weighted: f.weighted(),
        }
    }

    /// One summary per region present in the units, in region order.
    pub fn aggregate_all(&self, units: &[MergedUnit]) -> Vec<RegionalSummary> {
        let regions: BTreeSet<RegionId> = units.iter().filter_map(|u| u.region).collect();
        let loose = units.iter().filter(|u| u.region.is_none()).count();
        if loose > 0 {
            debug!("aggregate_all: {} units without region left out", loose);
        }
        regions
            .into_iter()
            .map(|r| self.aggregate(units, r))
            .collect()
    }

    pub fn aggregate_zone(
        &self,
        units: &[MergedUnit],
        zone: &Zone,
        normalizer: &Normalizer,
    ) -> AreaSummary {
        let excluded: BTreeSet<String> = zone
            .excluded_communes
            .iter()
            .map(|c| normalizer.normalize(c).name().to_string())
            .collect();
        let f = self.fold(units.iter().filter(|u| {
            u.region.map(|r| zone.regions.contains(&r)).unwrap_or(false)
                && !excluded.contains(u.key.name())
        }));
        f.area(&zone.name)
    }

    pub fn aggregate_metro(
        &self,
        units: &[MergedUnit],
        area: &MetroArea,
        normalizer: &Normalizer,
    ) -> AreaSummary {
        let members: BTreeSet<String> = area
            .communes
            .iter()
            .map(|c| normalizer.normalize(c).name().to_string())
            .collect();
        let f = self.fold(
            units
                .iter()
                .filter(|u| u.region == Some(area.region) && members.contains(u.key.name())),
        );
        f.area(&area.name)
    }

    pub fn aggregate_national(&self, units: &[MergedUnit]) -> AreaSummary {
        self.fold(units.iter()).area("Chile")
    }

    pub fn report(
        &self,
        units: &[MergedUnit],
        zones: &[Zone],
        metro_areas: &[MetroArea],
        normalizer: &Normalizer,
    ) -> SummaryReport {
        SummaryReport {
            regions: self.aggregate_all(units),
            zones: zones
                .iter()
                .map(|z| self.aggregate_zone(units, z, normalizer))
                .collect(),
            metro_areas: metro_areas
                .iter()
                .map(|a| self.aggregate_metro(units, a, normalizer))
                .collect(),
            national: self.aggregate_national(units),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::config::Settings;
    use crate::records::{ElectoralRecord, MatchQuality, SourceTier};
    use geo::MultiPolygon;

    fn unit(name: &str, region: u8, jara: f64, kast: f64, votes: Option<(u64, u64)>) -> MergedUnit {
        let n = Normalizer::plain();
        let diff = jara - kast;
        MergedUnit {
            key: n.normalize_in(name, Some(RegionId(region))),
            name: name.to_string(),
            region: Some(RegionId(region)),
            geometry: MultiPolygon::new(vec![]),
            source: SourceTier::LocalFile,
            electoral: ElectoralRecord {
                line: 0,
                unit_name: name.to_string(),
                region: Some(RegionId(region)),
                region_text: None,
                jara_pct: jara,
                kast_pct: kast,
                jara_votes: votes.map(|v| v.0),
                kast_votes: votes.map(|v| v.1),
                total_cast: None,
                blank: None,
                null: None,
                derived_pct: false,
            },
            diff_pct: diff,
            bucket: Classifier::default().classify(diff).unwrap(),
            quality: MatchQuality::RegionScoped,
        }
    }

    #[test]
    fn metropolitana_scenario() {
        let units = vec![
            unit("Santiago", 13, 55.5, 44.5, None),
            unit("Ñuñoa", 13, 48.0, 52.0, None),
        ];
        let s = Aggregator::new(1.0).aggregate(&units, RegionId(13));
        assert_eq!(s.unit_count, 2);
        assert_eq!(s.mean_diff_pct, Some(3.5));
        assert_eq!((s.jara_wins, s.kast_wins, s.ties), (1, 1, 0));
        assert_eq!(s.weighted, None);
    }

    #[test]
    fn empty_region_has_no_mean() {
        let s = Aggregator::new(1.0).aggregate(&[], RegionId(7));
        assert_eq!(s.unit_count, 0);
        assert_eq!(s.mean_diff_pct, None);
        assert_eq!((s.jara_wins, s.kast_wins, s.ties), (0, 0, 0));
    }

    #[test]
    fn ties_and_weighted_share() {
        let units = vec![
            unit("Talca", 7, 50.5, 49.5, Some((505, 495))),
            unit("Linares", 7, 30.0, 70.0, Some((300, 700))),
        ];
        let s = Aggregator::new(1.0).aggregate(&units, RegionId(7));
        assert_eq!(s.ties, 1);
        assert_eq!(s.kast_wins, 1);
        let w = s.weighted.unwrap();
        assert_eq!(w.valid_votes, 2000);
        assert_eq!(w.jara_pct, 40.25);
    }

    #[test]
    fn huge_vote_counts_drop_the_weighted_share() {
        let half = u64::MAX / 2;
        let units = vec![
            unit("Talca", 7, 50.0, 50.0, Some((half, half))),
            unit("Curicó", 7, 50.0, 50.0, Some((half, half))),
        ];
        let s = Aggregator::new(1.0).aggregate(&units, RegionId(7));
        assert_eq!(s.unit_count, 2);
        assert_eq!(s.ties, 2);
        assert_eq!(s.weighted, None);
    }

    #[test]
    fn zones_metro_and_national() {
        let settings = Settings::default();
        let n = settings.normalizer();
        let units = vec![
            unit("Santiago", 13, 60.0, 40.0, None),
            unit("Pirque", 13, 40.0, 60.0, None),
            unit("Isla de Pascua", 5, 70.0, 30.0, None),
            unit("Valparaíso", 5, 65.0, 35.0, None),
            unit("Arica", 15, 35.0, 65.0, None),
        ];
        let agg = Aggregator::new(1.0);
        let report = agg.report(&units, &settings.zones, &settings.metro_areas, &n);
        assert_eq!(report.regions.len(), 3);
        assert_eq!(report.regions[0].region, RegionId(5));
        let centro = report.zones.iter().find(|z| z.name == "Centro").unwrap();
        assert_eq!(centro.unit_count, 3);
        let norte = report.zones.iter().find(|z| z.name == "Norte").unwrap();
        assert_eq!(norte.kast_wins, 1);
        let gs = report.metro_areas.iter().find(|a| a.name == "Gran Santiago").unwrap();
        assert_eq!(gs.unit_count, 1);
        assert_eq!(report.national.unit_count, 5);
    }
}
