// Reading boundary features out of GeoJSON payloads.
//
// Two layouts are accepted: a FeatureCollection document, and newline
// delimited features (GeoJSONSeq, with or without the RS separator).

use geo::{Coord, LineString, MultiPolygon, Polygon};
use log::debug;
use serde_json::{Map, Value};
use snafu::ResultExt;

use crate::boundary::{JsonSnafu, PayloadSnafu, SourceError};
use crate::records::{GeographicFeature, RegionId, SourceTier};

/// Property names probed, in order, on every feature.
#[derive(Debug, Clone, Copy)]
pub struct AttributeNames<'a> {
    pub name: &'a [String],
    pub region: &'a [String],
    pub code: &'a [String],
}

#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub features: Vec<GeographicFeature>,
    /// Features dropped for lack of a name or of polygon geometry.
    pub skipped: usize,
}

pub fn read_features(
    bytes: &[u8],
    attrs: &AttributeNames,
    source: SourceTier,
) -> Result<FeatureSet, SourceError> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');
    let raw: Vec<Value> = match serde_json::from_str::<Value>(text) {
        Ok(doc) => match doc.get("type").and_then(|t| t.as_str()) {
            Some("FeatureCollection") => match doc.get("features") {
                Some(Value::Array(fs)) => fs.clone(),
                _ => {
                    return PayloadSnafu {
                        message: "FeatureCollection without a features array",
                    }
                    .fail()
                }
            },
            Some("Feature") => vec![doc],
            other => {
                return PayloadSnafu {
                    message: format!("unexpected GeoJSON type {:?}", other),
                }
                .fail()
            }
        },
        Err(e) => {
            let seq = read_sequence(text);
            if seq.is_empty() {
                return Err(e).context(JsonSnafu {});
            }
            seq
        }
    };

    let mut features = Vec::new();
    let mut skipped = 0;
    for f in raw.iter() {
        match to_feature(f, attrs, source) {
            Some(feature) => features.push(feature),
            None => skipped += 1,
        }
    }
    debug!(
        "read_features: {} features kept, {} skipped",
        features.len(),
        skipped
    );
    Ok(FeatureSet { features, skipped })
}

fn read_sequence(text: &str) -> Vec<Value> {
    text.lines()
        .map(|l| l.trim_matches(|c: char| c == '\u{1e}' || c.is_whitespace()))
        .filter(|l| !l.is_empty())
        .filter_map(|l| serde_json::from_str::<Value>(l).ok())
        .filter(|v| v.get("type").and_then(|t| t.as_str()) == Some("Feature"))
        .collect()
}

fn to_feature(f: &Value, attrs: &AttributeNames, source: SourceTier) -> Option<GeographicFeature> {
    let empty = Map::new();
    let props = f
        .get("properties")
        .and_then(|p| p.as_object())
        .unwrap_or(&empty);
    let name = attrs.name.iter().find_map(|a| match props.get(a) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    });
    let name = match name {
        Some(n) => n,
        None => {
            debug!("to_feature: no name attribute in {:?}", props.keys().collect::<Vec<_>>());
            return None;
        }
    };
    let geometry = match f.get("geometry").and_then(to_geometry) {
        Some(g) => g,
        None => {
            debug!("to_feature: {:?} has no polygon geometry", name);
            return None;
        }
    };
    let region = attrs
        .region
        .iter()
        .find_map(|a| props.get(a).and_then(as_number))
        .and_then(|n| u8::try_from(n).ok())
        .or_else(|| {
            attrs
                .code
                .iter()
                .find_map(|a| props.get(a).and_then(as_number))
                .and_then(|code| u8::try_from(code / 1000).ok())
        })
        .filter(|r| *r > 0)
        .map(RegionId);
    Some(GeographicFeature {
        name,
        region,
        geometry,
        source,
    })
}

// Integer properties are found both as numbers and as strings in the wild.
fn as_number(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn to_ring(positions: &[Vec<f64>]) -> Option<LineString<f64>> {
    let coords: Vec<Coord<f64>> = positions
        .iter()
        .filter(|p| p.len() >= 2)
        .map(|p| Coord { x: p[0], y: p[1] })
        .collect();
    if coords.len() < 3 {
        return None;
    }
    Some(LineString::new(coords))
}

fn to_polygon(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
    let mut it = rings.iter();
    let exterior = to_ring(it.next()?)?;
    let interiors: Vec<LineString<f64>> = it.filter_map(|r| to_ring(r)).collect();
    Some(Polygon::new(exterior, interiors))
}

fn to_geometry(g: &Value) -> Option<MultiPolygon<f64>> {
    let coords = g.get("coordinates")?.clone();
    let polygons: Vec<Polygon<f64>> = match g.get("type")?.as_str()? {
        "Polygon" => {
            let rings: Vec<Vec<Vec<f64>>> = serde_json::from_value(coords).ok()?;
            to_polygon(&rings).into_iter().collect()
        }
        "MultiPolygon" => {
            let polys: Vec<Vec<Vec<Vec<f64>>>> = serde_json::from_value(coords).ok()?;
            polys.iter().filter_map(|p| to_polygon(p)).collect()
        }
        _ => vec![],
    };
    if polygons.is_empty() {
        None
    } else {
        Some(MultiPolygon::new(polygons))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn read(text: &str) -> Result<FeatureSet, SourceError> {
        let name = names(&["NOM_COM", "Comuna"]);
        let region = names(&["codregion"]);
        let code = names(&["cod_comuna"]);
        let attrs = AttributeNames {
            name: &name,
            region: &region,
            code: &code,
        };
        read_features(text.as_bytes(), &attrs, SourceTier::LocalFile)
    }

    const SQUARE: &str = "[[[0,0],[1,0],[1,1],[0,1],[0,0]]]";

    #[test]
    fn feature_collection() {
        let doc = format!(
            r#"{{"type":"FeatureCollection","features":[
                {{"type":"Feature","properties":{{"NOM_COM":"Santiago","codregion":13}},"geometry":{{"type":"Polygon","coordinates":{sq}}}}},
                {{"type":"Feature","properties":{{"Comuna":"Arica","cod_comuna":"15101"}},"geometry":{{"type":"MultiPolygon","coordinates":[{sq},{sq}]}}}},
                {{"type":"Feature","properties":{{"NOM_COM":"Nowhere"}},"geometry":{{"type":"Point","coordinates":[0,0]}}}},
                {{"type":"Feature","properties":{{}},"geometry":{{"type":"Polygon","coordinates":{sq}}}}}
            ]}}"#,
            sq = SQUARE
        );
        let set = read(&doc).unwrap();
        assert_eq!(set.features.len(), 2);
        assert_eq!(set.skipped, 2);
        assert_eq!(set.features[0].name, "Santiago");
        assert_eq!(set.features[0].region, Some(RegionId(13)));
        assert_eq!(set.features[1].region, Some(RegionId(15)));
        assert_eq!(set.features[1].geometry.0.len(), 2);
    }

    #[test]
    fn feature_sequence() {
        let text = format!(
            "\u{1e}{{\"type\":\"Feature\",\"properties\":{{\"NOM_COM\":\"Lota\"}},\"geometry\":{{\"type\":\"Polygon\",\"coordinates\":{sq}}}}}\n\n{{\"type\":\"Feature\",\"properties\":{{\"NOM_COM\":\"Penco\"}},\"geometry\":{{\"type\":\"Polygon\",\"coordinates\":{sq}}}}}\n",
            sq = SQUARE
        );
        let set = read(&text).unwrap();
        assert_eq!(set.features.len(), 2);
        assert_eq!(set.features[1].name, "Penco");
        assert_eq!(set.features[1].region, None);
    }

    #[test]
    fn malformed_payloads() {
        assert!(matches!(read("not json"), Err(SourceError::Json { .. })));
        assert!(matches!(read(r#"{"type":"Topology"}"#), Err(SourceError::Payload { .. })));
        assert!(matches!(
            read(r#"{"type":"FeatureCollection"}"#),
            Err(SourceError::Payload { .. })
        ));
    }
}
