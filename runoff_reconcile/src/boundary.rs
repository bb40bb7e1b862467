// ********* Boundary resolution **********
//
// The resolver walks an ordered list of tiers. Each tier adds the units still
// missing; only the metropolitan refinement may replace a geometry that is
// already present. The last tier fabricates placeholders, so resolving never
// fails.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use snafu::{ResultExt, Snafu};

use crate::config::{Catalog, GeoSettings, MetroArea, Settings};
use crate::geojson::{read_features, AttributeNames, FeatureSet};
use crate::normalize::{NormalizedKey, Normalizer};
use crate::records::{GeographicFeature, RegionId, SourceTier, UnitRef};
use crate::synthetic;

/// Failure of a single source. Always recovered inside `Resolver::resolve`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SourceError {
    #[snafu(display("could not read {}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("download of {url} failed"))]
    Http { url: String, source: reqwest::Error },
    #[snafu(display("invalid GeoJSON"))]
    Json { source: serde_json::Error },
    #[snafu(display("unusable payload: {message}"))]
    Payload { message: String },
    #[snafu(display("network access disabled, {url} not fetched"))]
    Offline { url: String },
}

/// Blocking retrieval of a remote payload.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError>;
}

pub struct HttpFetch {
    client: reqwest::blocking::Client,
}

impl HttpFetch {
    pub fn new(timeout: Duration) -> Result<HttpFetch, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context(HttpSnafu { url: "" })?;
        Ok(HttpFetch { client })
    }
}

impl Fetch for HttpFetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        debug!("HttpFetch::fetch: {}", url);
        let bytes = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .context(HttpSnafu { url })?;
        Ok(bytes.to_vec())
    }
}

/// Refuses every request. Forces the chain down to local and synthetic tiers.
pub struct OfflineFetch;

impl Fetch for OfflineFetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        OfflineSnafu { url }.fail()
    }
}

/// One step of the fallback chain.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Tier {
    Local,
    Remote,
    Metropolitan,
    Synthetic,
}

impl Tier {
    pub fn source(self) -> SourceTier {
        match self {
            Tier::Local => SourceTier::LocalFile,
            Tier::Remote => SourceTier::RemoteDownload,
            Tier::Metropolitan => SourceTier::MetropolitanRefinement,
            Tier::Synthetic => SourceTier::Synthetic,
        }
    }

    pub fn chain() -> Vec<Tier> {
        vec![Tier::Local, Tier::Remote, Tier::Metropolitan, Tier::Synthetic]
    }
}

#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum TierStatus {
    Used {
        features: usize,
        added: usize,
        overridden: usize,
        skipped: usize,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
    },
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct TierReport {
    pub tier: SourceTier,
    pub source: String,
    #[serde(flatten)]
    pub status: TierStatus,
}

#[derive(PartialEq, Debug, Clone, Serialize, Default)]
pub struct ResolveDiagnostics {
    pub tiers: Vec<TierReport>,
    /// Which tier supplied each unit.
    pub provenance: Vec<UnitRef>,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub features: Vec<GeographicFeature>,
    pub diagnostics: ResolveDiagnostics,
}

// A unit that must end up with a geometry.
#[derive(Debug, Clone)]
struct KnownUnit {
    name: String,
    key: NormalizedKey,
    // Position in its region's catalogue list, used by the synthetic tier.
    index: usize,
    count: usize,
}

// Features gathered so far, keyed by (region, normalized name).
#[derive(Default)]
struct Collected {
    features: BTreeMap<(Option<RegionId>, String), GeographicFeature>,
}

impl Collected {
    fn key_of(f: &GeographicFeature, normalizer: &Normalizer) -> (Option<RegionId>, String) {
        (f.region, normalizer.normalize(&f.name).name().to_string())
    }

    fn insert(&mut self, f: GeographicFeature, normalizer: &Normalizer) -> bool {
        let key = Collected::key_of(&f, normalizer);
        if key.1.is_empty() || self.features.contains_key(&key) {
            return false;
        }
        // A unit is held either once without region or once per region.
        let clash = match key.0 {
            Some(_) => self.features.contains_key(&(None, key.1.clone())),
            None => self.features.keys().any(|(_, n)| *n == key.1),
        };
        if clash {
            return false;
        }
        self.features.insert(key, f);
        true
    }

    // Replaces the unit in the feature's region, and any region-less copy of it.
    fn replace(&mut self, f: GeographicFeature, normalizer: &Normalizer) -> bool {
        let key = Collected::key_of(&f, normalizer);
        let loose = self.features.remove(&(None, key.1.clone())).is_some();
        self.features.insert(key, f).is_some() || loose
    }

    fn covers(&self, unit: &KnownUnit) -> bool {
        let name = unit.key.name().to_string();
        match unit.key.region() {
            Some(r) => {
                self.features.contains_key(&(Some(r), name.clone()))
                    || self.features.contains_key(&(None, name))
            }
            None => self.features.keys().any(|(_, n)| *n == name),
        }
    }
}

/// GeographicSourceResolver.
pub struct Resolver {
    settings: GeoSettings,
    catalog: Catalog,
    metro_areas: Vec<MetroArea>,
    normalizer: Normalizer,
    fetcher: Box<dyn Fetch>,
    tiers: Vec<Tier>,
}

impl Resolver {
    pub fn new(settings: &Settings, fetcher: Box<dyn Fetch>) -> Resolver {
        Resolver::from_parts(
            settings.geo.clone(),
            settings.catalog.clone(),
            settings.metro_areas.clone(),
            settings.normalizer(),
            fetcher,
            Tier::chain(),
        )
    }

    pub(crate) fn from_parts(
        settings: GeoSettings,
        catalog: Catalog,
        metro_areas: Vec<MetroArea>,
        normalizer: Normalizer,
        fetcher: Box<dyn Fetch>,
        tiers: Vec<Tier>,
    ) -> Resolver {
        Resolver {
            settings,
            catalog,
            metro_areas,
            normalizer,
            fetcher,
            tiers,
        }
    }

    /// Makes sure the unit gets some geometry, even if no source knows it.
    pub fn add_known_unit(&mut self, name: &str, region: Option<RegionId>) -> bool {
        self.catalog.add(name, region, &self.normalizer)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn resolve(&self, scope: Option<&BTreeSet<RegionId>>) -> Resolution {
        let regions: BTreeSet<RegionId> = match scope {
            Some(s) => s.clone(),
            None => self.catalog.regions().into_iter().collect(),
        };
        let known = self.known_units(&regions);
        info!(
            "resolve: {} regions, {} known units",
            regions.len(),
            known.len()
        );

        let mut collected = Collected::default();
        let mut reports: Vec<TierReport> = Vec::new();
        for tier in self.tiers.iter() {
            let complete = known.iter().all(|u| collected.covers(u));
            match tier {
                Tier::Metropolitan => {
                    self.metropolitan(&regions, &mut collected, &mut reports);
                }
                _ if complete => {
                    debug!("resolve: every unit covered, {:?} not needed", tier);
                    reports.push(TierReport {
                        tier: tier.source(),
                        source: "-".to_string(),
                        status: TierStatus::Skipped {
                            reason: "all known units already resolved".to_string(),
                        },
                    });
                }
                Tier::Local => self.local(&regions, &mut collected, &mut reports),
                Tier::Remote => {
                    self.remote(&regions, &known, &mut collected, &mut reports)
                }
                Tier::Synthetic => self.synthetic(&known, &mut collected, &mut reports),
            }
        }

        let features: Vec<GeographicFeature> = collected.features.into_values().collect();
        let provenance: Vec<UnitRef> = features.iter().map(UnitRef::from).collect();
        let synthetic = features
            .iter()
            .filter(|f| f.source == SourceTier::Synthetic)
            .count();
        info!(
            "resolve: {} features, {} of them synthetic",
            features.len(),
            synthetic
        );
        Resolution {
            features,
            diagnostics: ResolveDiagnostics {
                tiers: reports,
                provenance,
            },
        }
    }

    fn known_units(&self, regions: &BTreeSet<RegionId>) -> Vec<KnownUnit> {
        let mut known = Vec::new();
        for r in regions.iter() {
            let names = self.catalog.communes(*r);
            for (index, name) in names.iter().enumerate() {
                known.push(KnownUnit {
                    name: name.clone(),
                    key: self.normalizer.normalize_in(name, Some(*r)),
                    index,
                    count: names.len(),
                });
            }
        }
        let unplaced = &self.catalog.unplaced;
        for (index, name) in unplaced.iter().enumerate() {
            known.push(KnownUnit {
                name: name.clone(),
                key: self.normalizer.normalize(name),
                index,
                count: unplaced.len(),
            });
        }
        known
    }

    fn attributes(&self) -> AttributeNames {
        AttributeNames {
            name: &self.settings.name_attributes,
            region: &self.settings.region_attributes,
            code: &self.settings.code_attributes,
        }
    }

    // Features whose region is known and outside the scope are dropped.
    fn in_scope(set: FeatureSet, regions: &BTreeSet<RegionId>) -> Vec<GeographicFeature> {
        set.features
            .into_iter()
            .filter(|f| f.region.map(|r| regions.contains(&r)).unwrap_or(true))
            .collect()
    }

    fn local(
        &self,
        regions: &BTreeSet<RegionId>,
        collected: &mut Collected,
        reports: &mut Vec<TierReport>,
    ) {
        let candidates: Vec<PathBuf> = self
            .settings
            .local_files
            .iter()
            .map(|f| self.settings.boundary_dir.join(f))
            .filter(|p| p.is_file())
            .collect();
        if candidates.is_empty() {
            info!(
                "local: no boundary file in {}",
                self.settings.boundary_dir.display()
            );
            reports.push(TierReport {
                tier: SourceTier::LocalFile,
                source: self.settings.boundary_dir.display().to_string(),
                status: TierStatus::Skipped {
                    reason: "no local boundary file".to_string(),
                },
            });
            return;
        }
        for path in candidates.iter() {
            let source = path.display().to_string();
            match read_file(path).and_then(|b| {
                read_features(&b, &self.attributes(), SourceTier::LocalFile)
            }) {
                Ok(set) if set.features.is_empty() => {
                    warn!("local: {} has no usable feature", source);
                    reports.push(TierReport {
                        tier: SourceTier::LocalFile,
                        source,
                        status: TierStatus::Failed {
                            error: "no usable feature".to_string(),
                        },
                    });
                }
                Ok(set) => {
                    let skipped = set.skipped;
                    let features = Resolver::in_scope(set, regions);
                    let total = features.len();
                    let added = features
                        .into_iter()
                        .filter(|f| collected.insert(f.clone(), &self.normalizer))
                        .count();
                    info!("local: {} gave {} features, {} added", source, total, added);
                    reports.push(TierReport {
                        tier: SourceTier::LocalFile,
                        source,
                        status: TierStatus::Used {
                            features: total,
                            added,
                            overridden: 0,
                            skipped,
                        },
                    });
                    return;
                }
                Err(e) => {
                    warn!("local: {} unusable: {}", source, e);
                    reports.push(TierReport {
                        tier: SourceTier::LocalFile,
                        source,
                        status: TierStatus::Failed {
                            error: error_chain(&e),
                        },
                    });
                }
            }
        }
    }

    fn remote(
        &self,
        regions: &BTreeSet<RegionId>,
        known: &[KnownUnit],
        collected: &mut Collected,
        reports: &mut Vec<TierReport>,
    ) {
        let remote = &self.settings.remote;
        if !remote.enabled {
            reports.push(TierReport {
                tier: SourceTier::RemoteDownload,
                source: remote.url_template.clone(),
                status: TierStatus::Skipped {
                    reason: "remote download disabled".to_string(),
                },
            });
            return;
        }
        for r in regions.iter() {
            let incomplete = known
                .iter()
                .any(|u| u.key.region() == Some(*r) && !collected.covers(u));
            if !incomplete {
                continue;
            }
            let url = remote.url_template.replace("{region}", &r.to_string());
            let result = self
                .fetcher
                .fetch(&url)
                .and_then(|b| read_features(&b, &self.attributes(), SourceTier::RemoteDownload));
            match result {
                Ok(set) => {
                    let skipped = set.skipped;
                    let features: Vec<GeographicFeature> = set
                        .features
                        .into_iter()
                        .map(|mut f| {
                            f.region = f.region.or(Some(*r));
                            f
                        })
                        .filter(|f| f.region == Some(*r))
                        .collect();
                    let total = features.len();
                    let added = features
                        .into_iter()
                        .filter(|f| collected.insert(f.clone(), &self.normalizer))
                        .count();
                    info!("remote: region {} gave {} features, {} added", r, total, added);
                    reports.push(TierReport {
                        tier: SourceTier::RemoteDownload,
                        source: url,
                        status: TierStatus::Used {
                            features: total,
                            added,
                            overridden: 0,
                            skipped,
                        },
                    });
                }
                Err(e) => {
                    warn!("remote: region {} unavailable: {}", r, error_chain(&e));
                    reports.push(TierReport {
                        tier: SourceTier::RemoteDownload,
                        source: url,
                        status: TierStatus::Failed {
                            error: error_chain(&e),
                        },
                    });
                }
            }
        }
    }

    fn metropolitan(
        &self,
        regions: &BTreeSet<RegionId>,
        collected: &mut Collected,
        reports: &mut Vec<TierReport>,
    ) {
        let metro = &self.settings.metro;
        let curated: BTreeSet<String> = self
            .metro_areas
            .iter()
            .filter(|a| a.region == metro.region && regions.contains(&a.region))
            .flat_map(|a| a.communes.iter())
            .map(|c| self.normalizer.normalize(c).name().to_string())
            .collect();
        if curated.is_empty() {
            reports.push(TierReport {
                tier: SourceTier::MetropolitanRefinement,
                source: "-".to_string(),
                status: TierStatus::Skipped {
                    reason: format!("region {} not requested", metro.region),
                },
            });
            return;
        }

        let local = metro
            .local_file
            .as_ref()
            .map(|f| self.settings.boundary_dir.join(f))
            .filter(|p| p.is_file());
        let (source, bytes) = match (local, metro.url.as_ref()) {
            (Some(p), _) => (p.display().to_string(), read_file(&p)),
            (None, Some(url)) => (url.clone(), self.fetcher.fetch(url)),
            (None, None) => {
                reports.push(TierReport {
                    tier: SourceTier::MetropolitanRefinement,
                    source: "-".to_string(),
                    status: TierStatus::Skipped {
                        reason: "no metropolitan dataset configured".to_string(),
                    },
                });
                return;
            }
        };
        let attrs = AttributeNames {
            name: &metro.name_attributes,
            region: &[],
            code: &[],
        };
        let set = match bytes.and_then(|b| {
            read_features(&b, &attrs, SourceTier::MetropolitanRefinement)
        }) {
            Ok(set) => set,
            Err(e) => {
                warn!("metropolitan: {} unavailable: {}", source, error_chain(&e));
                reports.push(TierReport {
                    tier: SourceTier::MetropolitanRefinement,
                    source,
                    status: TierStatus::Failed {
                        error: error_chain(&e),
                    },
                });
                return;
            }
        };

        let total = set.features.len();
        let (mut added, mut overridden) = (0, 0);
        for mut f in set.features.into_iter() {
            f.region = Some(metro.region);
            let name = self.normalizer.normalize(&f.name).name().to_string();
            if curated.contains(&name) {
                if collected.replace(f, &self.normalizer) {
                    overridden += 1;
                } else {
                    added += 1;
                }
            } else if collected.insert(f, &self.normalizer) {
                added += 1;
            }
        }
        info!(
            "metropolitan: {} gave {} features, {} added, {} overridden",
            source, total, added, overridden
        );
        reports.push(TierReport {
            tier: SourceTier::MetropolitanRefinement,
            source,
            status: TierStatus::Used {
                features: total,
                added,
                overridden,
                skipped: set.skipped,
            },
        });
    }

    fn synthetic(
        &self,
        known: &[KnownUnit],
        collected: &mut Collected,
        reports: &mut Vec<TierReport>,
    ) {
        let mut added = 0;
        let missing: Vec<&KnownUnit> = known.iter().filter(|u| !collected.covers(u)).collect();
        for unit in missing.into_iter() {
            let region = unit.key.region();
            let bounds = region
                .and_then(|r| self.settings.bounds(r).copied())
                .unwrap_or_else(|| synthetic::fallback_bounds(region));
            debug!("synthetic: placeholder for {}", unit.key);
            let feature = GeographicFeature {
                name: unit.name.clone(),
                region,
                geometry: synthetic::strip(&bounds, unit.index, unit.count),
                source: SourceTier::Synthetic,
            };
            if collected.insert(feature, &self.normalizer) {
                added += 1;
            }
        }
        if added > 0 {
            warn!("synthetic: {} units have placeholder geometry", added);
        }
        reports.push(TierReport {
            tier: SourceTier::Synthetic,
            source: "generated".to_string(),
            status: TierStatus::Used {
                features: added,
                added,
                overridden: 0,
                skipped: 0,
            },
        });
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, SourceError> {
    fs::read(path).context(IoSnafu { path })
}

// Error message including its sources.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut msg = e.to_string();
    let mut cur = e.source();
    while let Some(s) = cur {
        msg.push_str(": ");
        msg.push_str(&s.to_string());
        cur = s.source();
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    use crate::config::CatalogRegion;

    // Serves canned payloads and remembers what was asked.
    struct CannedFetch {
        payloads: HashMap<String, String>,
        asked: RefCell<Vec<String>>,
    }

    impl Fetch for CannedFetch {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
            self.asked.borrow_mut().push(url.to_string());
            match self.payloads.get(url) {
                Some(p) => Ok(p.as_bytes().to_vec()),
                None => PayloadSnafu {
                    message: "not found",
                }
                .fail(),
            }
        }
    }

    fn feature(name: &str, region: Option<u8>) -> String {
        let props = match region {
            Some(r) => format!(r#"{{"Comuna":"{}","codregion":{}}}"#, name, r),
            None => format!(r#"{{"NOM_COM":"{}"}}"#, name),
        };
        format!(
            r#"{{"type":"Feature","properties":{},"geometry":{{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}}}"#,
            props
        )
    }

    fn collection(features: &[String]) -> String {
        format!(
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            features.join(",")
        )
    }

    fn small_settings(dir: &Path) -> Settings {
        let mut s = Settings::default();
        s.geo.boundary_dir = dir.to_path_buf();
        s.geo.metro.local_file = None;
        s.catalog = Catalog {
            regions: vec![
                CatalogRegion {
                    region: RegionId(13),
                    communes: vec!["Santiago".to_string(), "Ñuñoa".to_string(), "Pirque".to_string()],
                },
                CatalogRegion {
                    region: RegionId(5),
                    communes: vec!["Valparaíso".to_string()],
                },
            ],
            unplaced: vec![],
        };
        s
    }

    fn empty_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("runoff_geo_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn offline_resolution_is_total() {
        let dir = empty_dir("offline");
        let mut resolver = Resolver::new(&small_settings(&dir), Box::new(OfflineFetch));
        resolver.add_known_unit("Springfield", None);
        let res = resolver.resolve(None);
        assert_eq!(res.features.len(), 5);
        assert!(res.features.iter().all(|f| f.source == SourceTier::Synthetic));
        assert!(res.features.iter().all(|f| !f.geometry.0.is_empty()));
        let failed = res
            .diagnostics
            .tiers
            .iter()
            .filter(|t| matches!(t.status, TierStatus::Failed { .. }))
            .count();
        // Two regional downloads and the metropolitan dataset.
        assert_eq!(failed, 3);
    }

    #[test]
    fn local_file_then_remote_for_missing_regions() {
        let dir = empty_dir("local");
        fs::write(
            dir.join("comunas.geojson"),
            collection(&[feature("Santiago", Some(13)), feature("Ñuñoa", Some(13)), feature("Pirque", Some(13))]),
        )
        .unwrap();
        let settings = small_settings(&dir);
        let mut payloads = HashMap::new();
        payloads.insert(
            settings.geo.remote.url_template.replace("{region}", "5"),
            collection(&[feature("Valparaíso", Some(5)), feature("Santiago", Some(13))]),
        );
        let fetch = CannedFetch {
            payloads,
            asked: RefCell::new(vec![]),
        };
        let mut settings = settings;
        settings.geo.metro.url = None;
        let resolver = Resolver::new(&settings, Box::new(fetch));
        let res = resolver.resolve(None);
        assert_eq!(res.features.len(), 4);
        let valpo = res.features.iter().find(|f| f.name == "Valparaíso").unwrap();
        assert_eq!(valpo.source, SourceTier::RemoteDownload);
        let stgo = res.features.iter().find(|f| f.name == "Santiago").unwrap();
        assert_eq!(stgo.source, SourceTier::LocalFile);
        assert!(res
            .diagnostics
            .tiers
            .iter()
            .any(|t| t.tier == SourceTier::Synthetic && matches!(t.status, TierStatus::Skipped { .. })));
    }

    #[test]
    fn metropolitan_refinement_overrides_curated_units_only() {
        let dir = empty_dir("metro");
        fs::write(
            dir.join("comunas.geojson"),
            collection(&[feature("Santiago", None), feature("Ñuñoa", Some(13)), feature("Pirque", Some(13))]),
        )
        .unwrap();
        fs::write(
            dir.join("GRAN_SANTIAGO.geojson"),
            collection(&[feature("SANTIAGO", None), feature("Pirque", None)]),
        )
        .unwrap();
        let mut settings = small_settings(&dir);
        settings.geo.metro.local_file = Some("GRAN_SANTIAGO.geojson".to_string());
        let scope: BTreeSet<RegionId> = [RegionId(13)].into_iter().collect();
        let resolver = Resolver::new(&settings, Box::new(OfflineFetch));
        let res = resolver.resolve(Some(&scope));
        assert_eq!(res.features.len(), 3);
        let stgo = res.features.iter().find(|f| f.name == "SANTIAGO").unwrap();
        assert_eq!(stgo.source, SourceTier::MetropolitanRefinement);
        assert_eq!(stgo.region, Some(RegionId(13)));
        // Pirque is not part of Gran Santiago.
        let pirque = res.features.iter().find(|f| f.name == "Pirque").unwrap();
        assert_eq!(pirque.source, SourceTier::LocalFile);
    }

    #[test]
    fn one_feature_per_unit_across_tiers() {
        let dir = empty_dir("loose");
        fs::write(
            dir.join("comunas.geojson"),
            collection(&[feature("Santiago", Some(13)), feature("Pirque", None)]),
        )
        .unwrap();
        fs::write(dir.join("GRAN_SANTIAGO.geojson"), collection(&[feature("Pirque", None)])).unwrap();
        let mut settings = small_settings(&dir);
        settings.geo.metro.local_file = Some("GRAN_SANTIAGO.geojson".to_string());
        let scope: BTreeSet<RegionId> = [RegionId(13)].into_iter().collect();
        let resolver = Resolver::new(&settings, Box::new(OfflineFetch));
        let res = resolver.resolve(Some(&scope));
        let pirque: Vec<&GeographicFeature> =
            res.features.iter().filter(|f| f.name == "Pirque").collect();
        assert_eq!(pirque.len(), 1);
        assert_eq!(pirque[0].source, SourceTier::LocalFile);
        assert_eq!(pirque[0].region, None);
        // Santiago, Pirque, and a placeholder for Ñuñoa.
        assert_eq!(res.features.len(), 3);
    }

    #[test]
    fn loose_insert_yields_to_scoped_feature() {
        let n = Normalizer::plain();
        let mut collected = Collected::default();
        let scoped = GeographicFeature {
            name: "Pirque".to_string(),
            region: Some(RegionId(13)),
            geometry: synthetic::strip(&synthetic::fallback_bounds(None), 0, 1),
            source: SourceTier::LocalFile,
        };
        let mut loose = scoped.clone();
        loose.region = None;
        loose.source = SourceTier::RemoteDownload;
        assert!(collected.insert(scoped, &n));
        assert!(!collected.insert(loose, &n));
        assert_eq!(collected.features.len(), 1);
    }

    #[test]
    fn broken_local_file_falls_through() {
        let dir = empty_dir("broken");
        fs::write(dir.join("comunas_chile.geojson"), "{ not json").unwrap();
        fs::write(dir.join("comunas.geojson"), collection(&[feature("Valparaíso", Some(5))])).unwrap();
        let scope: BTreeSet<RegionId> = [RegionId(5)].into_iter().collect();
        let resolver = Resolver::new(&small_settings(&dir), Box::new(OfflineFetch));
        let res = resolver.resolve(Some(&scope));
        assert_eq!(res.features.len(), 1);
        assert_eq!(res.features[0].source, SourceTier::LocalFile);
        assert!(matches!(res.diagnostics.tiers[0].status, TierStatus::Failed { .. }));
    }
}
