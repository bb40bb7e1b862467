// ********* Output files **********

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::json;
use serde_json::Value as JSValue;
use snafu::prelude::*;
use text_diff::print_diff;

use std::fs;
use std::path::Path;

use runoff_reconcile::{MatchQuality, MergedUnit, SourceTier};

use crate::pipeline::*;

fn geometry_js(unit: &MergedUnit) -> JSValue {
    let polygons: Vec<Vec<Vec<[f64; 2]>>> = unit
        .geometry
        .0
        .iter()
        .map(|p| {
            std::iter::once(p.exterior())
                .chain(p.interiors().iter())
                .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
                .collect()
        })
        .collect();
    json!({"type": "MultiPolygon", "coordinates": polygons})
}

/// The properties a map renderer needs for one unit.
pub fn unit_properties(unit: &MergedUnit) -> JSValue {
    json!({
        "name": unit.name,
        "region": unit.region,
        "jara_pct": unit.electoral.jara_pct,
        "kast_pct": unit.electoral.kast_pct,
        "diff_pct": unit.diff_pct,
        "bucket": unit.bucket.index(),
        "bucket_label": unit.bucket.label(),
        "color": unit.bucket.color(),
        "quality": unit.quality,
        "source": unit.source,
    })
}

pub fn feature_collection(units: &[MergedUnit]) -> JSValue {
    let features: Vec<JSValue> = units
        .iter()
        .map(|u| {
            json!({
                "type": "Feature",
                "properties": unit_properties(u),
                "geometry": geometry_js(u),
            })
        })
        .collect();
    json!({"type": "FeatureCollection", "features": features})
}

pub fn write_geojson(path: &Path, units: &[MergedUnit]) -> MapResult<()> {
    let text = serde_json::to_string(&feature_collection(units)).context(SerializingJsonSnafu {
        what: "merged units",
    })?;
    fs::write(path, text).context(WritingFileSnafu {
        path: path.display().to_string(),
    })?;
    debug!("write_geojson: {} features to {}", units.len(), path.display());
    Ok(())
}

#[derive(Debug, Serialize)]
struct FlatUnit<'a> {
    name: &'a str,
    region: Option<u8>,
    jara_pct: f64,
    kast_pct: f64,
    diff_pct: f64,
    bucket: usize,
    bucket_label: &'static str,
    color: &'static str,
    quality: MatchQuality,
    source: SourceTier,
    jara_votes: Option<u64>,
    kast_votes: Option<u64>,
    valid_votes: Option<u64>,
}

impl<'a> From<&'a MergedUnit> for FlatUnit<'a> {
    fn from(u: &'a MergedUnit) -> Self {
        FlatUnit {
            name: &u.name,
            region: u.region.map(|r| r.0),
            jara_pct: u.electoral.jara_pct,
            kast_pct: u.electoral.kast_pct,
            diff_pct: u.diff_pct,
            bucket: u.bucket.index(),
            bucket_label: u.bucket.label(),
            color: u.bucket.color(),
            quality: u.quality,
            source: u.source,
            jara_votes: u.electoral.jara_votes,
            kast_votes: u.electoral.kast_votes,
            valid_votes: u.electoral.valid_votes(),
        }
    }
}

/// The merged units without their geometry, one row each.
pub fn write_flat_csv(path: &Path, units: &[MergedUnit]) -> MapResult<()> {
    let p = path.display().to_string();
    let mut wtr = csv::Writer::from_path(path).context(WritingCsvSnafu { path: p.clone() })?;
    for u in units.iter() {
        wtr.serialize(FlatUnit::from(u))
            .context(WritingCsvSnafu { path: p.clone() })?;
    }
    wtr.flush().context(WritingFileSnafu { path: p })?;
    Ok(())
}

/// Writes a pretty-printed JSON document and returns its text.
pub fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> MapResult<String> {
    let text = serde_json::to_string_pretty(value).context(SerializingJsonSnafu { what })?;
    fs::write(path, &text).context(WritingFileSnafu {
        path: path.display().to_string(),
    })?;
    debug!("write_json: {} written to {}", what, path.display());
    Ok(text)
}

pub fn read_reference(path: &str) -> MapResult<JSValue> {
    let contents = fs::read_to_string(path).context(ReadingFileSnafu { path })?;
    debug!("read_reference: {} bytes", contents.len());
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })
}

/// Compares computed summaries with a reference file. Both sides go through
/// the same printer so that key order and spacing do not matter.
pub fn check_reference(computed: &str, reference_path: &str) -> MapResult<()> {
    let reference = read_reference(reference_path)?;
    let computed: JSValue = serde_json::from_str(computed).context(ParsingJsonSnafu {
        path: "computed summaries",
    })?;
    let pretty_ref = serde_json::to_string_pretty(&reference).context(SerializingJsonSnafu {
        what: "reference summaries",
    })?;
    let pretty_computed = serde_json::to_string_pretty(&computed).context(SerializingJsonSnafu {
        what: "summaries",
    })?;
    if pretty_ref != pretty_computed {
        warn!("Found differences with the reference summaries");
        print_diff(pretty_ref.as_str(), pretty_computed.as_str(), "\n");
        whatever!("Difference detected between computed summaries and reference summaries")
    }
    info!("summaries match the reference {}", reference_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, MultiPolygon, Rect};
    use runoff_reconcile::{Classifier, ElectoralRecord, Normalizer, RegionId};

    fn unit(name: &str, jara: f64, votes: Option<(u64, u64)>) -> MergedUnit {
        let rect = Rect::new(coord! { x: -71.0, y: -34.0 }, coord! { x: -70.5, y: -33.0 });
        let diff = jara - (100.0 - jara);
        MergedUnit {
            key: Normalizer::plain().normalize_in(name, Some(RegionId(13))),
            name: name.to_string(),
            region: Some(RegionId(13)),
            geometry: MultiPolygon::new(vec![rect.to_polygon()]),
            source: SourceTier::LocalFile,
            electoral: ElectoralRecord {
                line: 2,
                unit_name: name.to_string(),
                region: Some(RegionId(13)),
                region_text: Some("13".to_string()),
                jara_pct: jara,
                kast_pct: 100.0 - jara,
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
    fn feature_properties() {
        let fc = feature_collection(&[unit("Providencia", 30.0, None)]);
        let f = &fc["features"][0];
        assert_eq!(f["properties"]["name"], "Providencia");
        assert_eq!(f["properties"]["region"], 13);
        assert_eq!(f["properties"]["diff_pct"], -40.0);
        assert_eq!(f["properties"]["bucket"], 1);
        assert_eq!(f["properties"]["color"], "#1A3D7C");
        assert_eq!(f["properties"]["quality"], "region-scoped");
        assert_eq!(f["properties"]["source"], "local-file");
        let rings = f["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(rings.len(), 1);
        // Closed ring of a rectangle.
        assert_eq!(rings[0].as_array().unwrap().len(), 5);
    }

    #[test]
    fn flat_csv_rows() {
        let dir = std::env::temp_dir().join(format!("runoffmap_export_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("merged.csv");
        write_flat_csv(
            &path,
            &[unit("Providencia", 30.0, None), unit("Renca", 60.0, Some((600, 400)))],
        )
        .unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("name,region,jara_pct,kast_pct,diff_pct,bucket"));
        assert!(lines[1].starts_with("Providencia,13,30.0,70.0,-40.0,1,"));
        assert!(lines[1].ends_with(",,,"));
        assert!(lines[2].ends_with(",600,400,1000"));
    }

    #[test]
    fn reference_comparison_ignores_layout() {
        let dir = std::env::temp_dir().join(format!("runoffmap_ref_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("reference.json");
        fs::write(&path, r#"{"b": [1, 2], "a": {"x": 1.5}}"#).unwrap();
        let p = path.display().to_string();
        assert!(check_reference("{\"a\":{\"x\":1.5},\"b\":[1,2]}", &p).is_ok());
        assert!(check_reference("{\"a\":{\"x\":2.5},\"b\":[1,2]}", &p).is_err());
    }
}
