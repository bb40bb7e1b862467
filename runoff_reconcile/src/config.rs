// ********* Configuration **********

// Every lookup table used by the pipeline lives here. The tables are plain
// data, built once (defaults below, optionally overridden from a JSON file by
// the caller) and handed explicitly to the component that needs them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use log::debug;
use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt, Snafu};

use crate::encoding::TextEncoding;
use crate::normalize::Normalizer;
use crate::parser::Field;
use crate::records::RegionId;

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub aliases: AliasTable,
    pub regions: RegionTable,
    pub parser: ParserSettings,
    pub classifier: ClassifierBands,
    pub geo: GeoSettings,
    pub catalog: Catalog,
    pub metro_areas: Vec<MetroArea>,
    pub zones: Vec<Zone>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            aliases: AliasTable::default(),
            regions: RegionTable::default(),
            parser: ParserSettings::default(),
            classifier: ClassifierBands::default(),
            geo: GeoSettings::default(),
            catalog: Catalog::default(),
            metro_areas: default_metro_areas(),
            zones: default_zones(),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("invalid configuration document"))]
    Json { source: serde_json::Error },
    #[snafu(display("invalid classifier bands: tie band {tie_band}, band width {band_width}"))]
    Bands { tie_band: f64, band_width: f64 },
    #[snafu(display("at least one candidate encoding is required"))]
    NoEncoding,
    #[snafu(display("bad character ratio {ratio} is outside [0, 1]"))]
    BadCharRatio { ratio: f64 },
    #[snafu(display("{context} refers to unknown region {region}"))]
    UnknownRegion { region: RegionId, context: String },
}

impl Settings {
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(&self.aliases)
    }

    /// Reads a JSON document. Missing keys keep their default value.
    pub fn from_json(text: &str) -> Result<Settings, ConfigError> {
        let settings: Settings = serde_json::from_str(text).context(JsonSnafu {})?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bands = &self.classifier;
        ensure!(
            bands.tie_band.is_finite()
                && bands.band_width.is_finite()
                && bands.tie_band >= 0.0
                && bands.band_width > bands.tie_band,
            BandsSnafu {
                tie_band: bands.tie_band,
                band_width: bands.band_width
            }
        );
        ensure!(!self.parser.encodings.is_empty(), NoEncodingSnafu {});
        let ratio = self.parser.max_bad_char_ratio;
        ensure!((0.0..=1.0).contains(&ratio), BadCharRatioSnafu { ratio });

        let known = |r: RegionId| self.regions.get(r).is_some();
        let mut references: Vec<(RegionId, String)> = Vec::new();
        references.extend(
            self.catalog
                .regions
                .iter()
                .map(|c| (c.region, "catalog".to_string())),
        );
        references.extend(
            self.metro_areas
                .iter()
                .map(|a| (a.region, format!("metropolitan area {}", a.id))),
        );
        for z in self.zones.iter() {
            references.extend(z.regions.iter().map(|r| (*r, format!("zone {}", z.name))));
        }
        if let Some(r) = self.parser.default_region {
            references.push((r, "default region".to_string()));
        }
        for (region, context) in references.into_iter() {
            ensure!(known(region), UnknownRegionSnafu { region, context });
        }
        debug!("Settings::validate: ok");
        Ok(())
    }
}

/// Known orthographic variants: variant -> canonical name.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable(pub BTreeMap<String, String>);

impl Default for AliasTable {
    fn default() -> Self {
        let pairs = [
            ("Llay-Llay", "Llaillay"),
            ("Llay Llay", "Llaillay"),
            ("Cabo de Hornos (Ex-Navarino)", "Cabo de Hornos"),
            ("Cabo de Hornos(Ex-Navarino)", "Cabo de Hornos"),
            ("Trehuaco", "Treguaco"),
            ("Aisén", "Aysén"),
            ("Coihaique", "Coyhaique"),
            ("Marchigüe", "Marchihue"),
            ("Paiguano", "Paihuano"),
            ("Til Til", "Tiltil"),
            ("Til-Til", "Tiltil"),
            ("Chol Chol", "Cholchol"),
            ("Pto. Montt", "Puerto Montt"),
            ("Pto Montt", "Puerto Montt"),
            ("Pto. Varas", "Puerto Varas"),
            ("Pto. Natales", "Puerto Natales"),
            ("Pto. Aysén", "Puerto Aysén"),
            ("Pto. Octay", "Puerto Octay"),
            ("Rapa Nui", "Isla de Pascua"),
            ("Isla de Pascua (Rapa Nui)", "Isla de Pascua"),
            ("Juan Fernandez (Isla Robinson Crusoe)", "Juan Fernández"),
            ("Ohiggins", "O'Higgins"),
            ("Calera (La Calera)", "Calera"),
            ("La Calera", "Calera"),
            ("San Vicente de Tagua Tagua", "San Vicente"),
            ("Alto Bío-Bío", "Alto Biobío"),
            ("Alto Bio Bio", "Alto Biobío"),
        ];
        AliasTable(
            pairs
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
        )
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionInfo {
    pub id: RegionId,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionTable(pub Vec<RegionInfo>);

const ROMAN: [&str; 16] = [
    "i", "ii", "iii", "iv", "v", "vi", "vii", "viii", "ix", "x", "xi", "xii", "xiii", "xiv", "xv",
    "xvi",
];

impl RegionTable {
    pub fn get(&self, id: RegionId) -> Option<&RegionInfo> {
        self.0.iter().find(|r| r.id == id)
    }

    pub fn ids(&self) -> Vec<RegionId> {
        let mut ids: Vec<RegionId> = self.0.iter().map(|r| r.id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Maps free text to a region: exact normalized match on names and aliases,
    /// then a number or roman numeral, then the longest name contained in the text.
    pub fn lookup(&self, text: &str, normalizer: &Normalizer) -> Option<RegionId> {
        let key = normalizer.normalize(text);
        let key = key.name();
        if key.is_empty() {
            return None;
        }
        let candidates: Vec<(String, RegionId)> = self
            .0
            .iter()
            .flat_map(|r| {
                std::iter::once(&r.name)
                    .chain(std::iter::once(&r.title))
                    .chain(r.aliases.iter())
                    .map(move |n| (normalizer.normalize(n).name().to_string(), r.id))
            })
            .filter(|(n, _)| !n.is_empty())
            .collect();

        if let Some((_, id)) = candidates.iter().find(|(n, _)| n == key) {
            return Some(*id);
        }

        let bare = key
            .trim_start_matches("region")
            .trim_start_matches(" de ")
            .trim();
        if let Ok(num) = bare.parse::<u8>() {
            return self.get(RegionId(num)).map(|r| r.id);
        }
        if let Some(pos) = ROMAN.iter().position(|r| *r == bare) {
            return self.get(RegionId((pos + 1) as u8)).map(|r| r.id);
        }

        candidates
            .iter()
            .filter(|(n, _)| n.len() >= 4 && key.contains(n.as_str()))
            .max_by_key(|(n, _)| n.len())
            .map(|(_, id)| *id)
    }
}

impl Default for RegionTable {
    fn default() -> Self {
        let rows: [(u8, &str, &str, &[&str]); 16] = [
            (1, "Tarapacá", "Región de Tarapacá", &["De Tarapacá"]),
            (2, "Antofagasta", "Región de Antofagasta", &["De Antofagasta"]),
            (3, "Atacama", "Región de Atacama", &["De Atacama"]),
            (4, "Coquimbo", "Región de Coquimbo", &["De Coquimbo"]),
            (5, "Valparaíso", "Región de Valparaíso", &["De Valparaíso"]),
            (
                6,
                "O'Higgins",
                "Región del Libertador General Bernardo O'Higgins",
                &[
                    "Libertador",
                    "Libertador General Bernardo O'Higgins",
                    "Del Libertador General Bernardo O'Higgins",
                ],
            ),
            (7, "Maule", "Región del Maule", &["Del Maule"]),
            (8, "Biobío", "Región del Biobío", &["Bio Bío", "Bio Bio", "Bío-Bío", "Del Biobío"]),
            (
                9,
                "Araucanía",
                "Región de la Araucanía",
                &["La Araucanía", "De la Araucanía"],
            ),
            (10, "Los Lagos", "Región de Los Lagos", &["De Los Lagos"]),
            (
                11,
                "Aysén",
                "Región de Aysén del General Carlos Ibáñez del Campo",
                &["Aysén del General Carlos Ibáñez del Campo", "Aisén"],
            ),
            (
                12,
                "Magallanes",
                "Región de Magallanes y de la Antártica Chilena",
                &["Magallanes y de la Antártica Chilena", "Magallanes y Antártica Chilena"],
            ),
            (
                13,
                "Metropolitana",
                "Región Metropolitana de Santiago",
                &["Metropolitana de Santiago", "RM", "Santiago Metropolitan"],
            ),
            (14, "Los Ríos", "Región de Los Ríos", &["De Los Ríos"]),
            (
                15,
                "Arica y Parinacota",
                "Región de Arica y Parinacota",
                &["De Arica y Parinacota"],
            ),
            (16, "Ñuble", "Región de Ñuble", &["De Ñuble"]),
        ];
        RegionTable(
            rows.iter()
                .map(|(id, name, title, aliases)| RegionInfo {
                    id: RegionId(*id),
                    name: name.to_string(),
                    title: title.to_string(),
                    aliases: aliases.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
        )
    }
}

/// The header synonyms for one canonical field.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSynonyms {
    pub field: Field,
    pub synonyms: Vec<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParserSettings {
    /// Tried in order, the first acceptable decoding wins.
    pub encodings: Vec<TextEncoding>,
    /// Fraction of undecodable characters tolerated by a candidate encoding.
    pub max_bad_char_ratio: f64,
    pub columns: Vec<ColumnSynonyms>,
    /// Region given to every row when the input has no region column.
    pub default_region: Option<RegionId>,
}

impl Default for ParserSettings {
    fn default() -> Self {
        let table: [(Field, &[&str]); 9] = [
            (
                Field::Commune,
                &[
                    "comuna",
                    "nombre comuna",
                    "comuna nombre",
                    "nombre_comuna",
                    "comunna",
                    "commune",
                    "municipio",
                ],
            ),
            (
                Field::Region,
                &["region", "nombre region", "region nombre", "nombre_region"],
            ),
            (
                Field::JaraPct,
                &[
                    "jara_pct",
                    "jara %",
                    "jara pct",
                    "pct jara",
                    "porcentaje jara",
                    "jara porcentaje",
                    "Jeannette Jara_pct",
                    "Jeanette Jara_pct",
                ],
            ),
            (
                Field::KastPct,
                &[
                    "kast_pct",
                    "kast %",
                    "kast pct",
                    "pct kast",
                    "porcentaje kast",
                    "kast porcentaje",
                    "José Antonio Kast_pct",
                    "Jose Antonio Kast Rist_pct",
                ],
            ),
            (
                Field::JaraVotes,
                &[
                    "jara_votos",
                    "jara votos",
                    "votos jara",
                    "jara votes",
                    "Jeannette Jara_votos",
                    "Jeanette Jara_votos",
                ],
            ),
            (
                Field::KastVotes,
                &[
                    "kast_votos",
                    "kast votos",
                    "votos kast",
                    "kast votes",
                    "José Antonio Kast_votos",
                    "Jose Antonio Kast Rist_votos",
                ],
            ),
            (
                Field::BlankVotes,
                &[
                    "blanco_votos",
                    "blanco votos",
                    "votos blanco",
                    "blancos",
                    "votos en blanco",
                    "Votos en Blanco_votos",
                ],
            ),
            (
                Field::NullVotes,
                &[
                    "nulo_votos",
                    "nulo votos",
                    "votos nulo",
                    "votos nulos",
                    "nulos",
                    "Votos Nulos_votos",
                ],
            ),
            (
                Field::TotalCast,
                &[
                    "emitidos_votos",
                    "emitidos votos",
                    "votos emitidos",
                    "total votos",
                    "votos_total",
                    "total votacion",
                    "Total Votación_votos",
                ],
            ),
        ];
        ParserSettings {
            encodings: vec![
                TextEncoding::Utf8,
                TextEncoding::Windows1252,
                TextEncoding::Latin1,
            ],
            max_bad_char_ratio: 0.001,
            columns: table
                .iter()
                .map(|(field, syns)| ColumnSynonyms {
                    field: *field,
                    synonyms: syns.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
            default_region: None,
        }
    }
}

/// Band layout of the classifier. Values are percentage points of `jara - kast`.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassifierBands {
    /// Half width of the technical tie band around 0.
    pub tie_band: f64,
    /// Width of every non-tie band except the open-ended extremes.
    pub band_width: f64,
}

impl Default for ClassifierBands {
    fn default() -> Self {
        ClassifierBands {
            tie_band: 1.0,
            band_width: 10.0,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionBounds {
    pub region: RegionId,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteSettings {
    pub enabled: bool,
    /// `{region}` is replaced by the region number.
    pub url_template: String,
    pub timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            enabled: true,
            url_template:
                "https://raw.githubusercontent.com/caracena/chile-geojson/master/{region}.geojson"
                    .to_string(),
            timeout_secs: 20,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetroSourceSettings {
    /// Looked up in the boundary directory before trying the url.
    pub local_file: Option<String>,
    pub url: Option<String>,
    /// Region given to the refinement features.
    pub region: RegionId,
    pub name_attributes: Vec<String>,
}

impl Default for MetroSourceSettings {
    fn default() -> Self {
        MetroSourceSettings {
            local_file: Some("GRAN_SANTIAGO.geojson".to_string()),
            url: Some("https://raw.githubusercontent.com/robsalasco/precenso_2016_geojson_chile/master/Extras/GRAN_SANTIAGO.geojson".to_string()),
            region: RegionId(13),
            name_attributes: ["NOM_COM", "Comuna", "nombre", "NOMBRE", "comuna", "NOMCOM"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeoSettings {
    pub boundary_dir: PathBuf,
    pub local_files: Vec<String>,
    /// Property names probed, in order, for the unit name.
    pub name_attributes: Vec<String>,
    pub region_attributes: Vec<String>,
    /// Unit codes: the region is `code / 1000` when no region attribute exists.
    pub code_attributes: Vec<String>,
    pub remote: RemoteSettings,
    pub metro: MetroSourceSettings,
    pub region_bounds: Vec<RegionBounds>,
}

impl GeoSettings {
    pub fn bounds(&self, region: RegionId) -> Option<&RegionBounds> {
        self.region_bounds.iter().find(|b| b.region == region)
    }
}

impl Default for GeoSettings {
    fn default() -> Self {
        let bounds: [(u8, f64, f64, f64, f64); 16] = [
            (1, -70.5, -20.5, -68.5, -17.5),
            (2, -71.5, -25.5, -67.5, -21.5),
            (3, -72.5, -29.5, -69.5, -25.5),
            (4, -72.5, -32.5, -69.5, -29.5),
            (5, -73.5, -34.5, -70.5, -31.5),
            (6, -72.5, -35.5, -69.5, -33.5),
            (7, -73.5, -37.5, -70.5, -34.5),
            (8, -74.5, -39.5, -71.5, -36.5),
            (9, -74.5, -41.5, -71.5, -38.5),
            (10, -75.5, -44.5, -71.5, -40.5),
            (11, -76.5, -48.5, -71.5, -43.5),
            (12, -76.5, -56.5, -68.5, -51.5),
            (13, -71.5, -34.5, -69.5, -32.5),
            (14, -74.5, -41.5, -71.5, -39.5),
            (15, -70.5, -19.5, -68.5, -17.5),
            (16, -73.5, -37.5, -71.5, -35.5),
        ];
        GeoSettings {
            boundary_dir: PathBuf::from("."),
            local_files: [
                "comunas_chile.geojson",
                "comunas.geojson",
                "chile_comunas.geojson",
                "chile.geojson",
                "comunas.json",
                "comunas.geojsonl",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            name_attributes: ["NOM_COM", "Comuna", "comuna", "NOMBRE", "nombre", "name", "NOMCOM"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            region_attributes: ["codregion", "REGION_NUM", "REGION", "region"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            code_attributes: ["cod_comuna", "COD_COM", "CUT_COM", "cut"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            remote: RemoteSettings::default(),
            metro: MetroSourceSettings::default(),
            region_bounds: bounds
                .iter()
                .map(|(r, min_x, min_y, max_x, max_y)| RegionBounds {
                    region: RegionId(*r),
                    min_x: *min_x,
                    min_y: *min_y,
                    max_x: *max_x,
                    max_y: *max_y,
                })
                .collect(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRegion {
    pub region: RegionId,
    pub communes: Vec<String>,
}

/// The known administrative units, per region. Every unit listed here is
/// guaranteed a geometry by the resolver.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Catalog {
    pub regions: Vec<CatalogRegion>,
    /// Units known by name only.
    pub unplaced: Vec<String>,
}

impl Catalog {
    pub fn communes(&self, region: RegionId) -> &[String] {
        self.regions
            .iter()
            .find(|c| c.region == region)
            .map(|c| c.communes.as_slice())
            .unwrap_or(&[])
    }

    pub fn regions(&self) -> Vec<RegionId> {
        let mut ids: Vec<RegionId> = self.regions.iter().map(|c| c.region).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Adds a unit unless a unit with the same key is already known in that scope.
    pub fn add(&mut self, name: &str, region: Option<RegionId>, normalizer: &Normalizer) -> bool {
        let key = normalizer.normalize(name);
        if key.name().is_empty() {
            return false;
        }
        let same = |n: &String| normalizer.normalize(n).name() == key.name();
        match region {
            Some(r) => {
                if let Some(entry) = self.regions.iter_mut().find(|c| c.region == r) {
                    if entry.communes.iter().any(same) {
                        return false;
                    }
                    entry.communes.push(name.to_string());
                } else {
                    self.regions.push(CatalogRegion {
                        region: r,
                        communes: vec![name.to_string()],
                    });
                }
                true
            }
            None => {
                let known_somewhere = self.unplaced.iter().any(same)
                    || self.regions.iter().any(|c| c.communes.iter().any(same));
                if known_somewhere {
                    return false;
                }
                self.unplaced.push(name.to_string());
                true
            }
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let table: [(u8, &[&str]); 16] = [
            (1, &["Iquique", "Alto Hospicio", "Pozo Almonte", "Camiña", "Colchane", "Huara", "Pica"]),
            (2, &["Antofagasta", "Calama", "Tocopilla", "María Elena", "Mejillones", "Sierra Gorda", "Taltal"]),
            (3, &["Copiapó", "Caldera", "Chañaral", "Diego de Almagro", "Huasco", "Vallenar", "Freirina"]),
            (4, &["La Serena", "Coquimbo", "Ovalle", "Illapel", "Vicuña", "Andacollo", "Salamanca"]),
            (
                5,
                &[
                    "Valparaíso", "Viña del Mar", "Quilpué", "Villa Alemana", "San Antonio", "Los Andes",
                    "Quillota", "Juan Fernández", "Isla de Pascua", "Concón", "Limache", "La Cruz",
                    "Calera", "San Felipe", "Panquehue", "Santa María", "Rinconada", "El Quisco",
                    "El Tabo", "Cartagena", "Casablanca", "Catemu", "Hijuelas", "La Ligua", "Llaillay",
                    "Nogales", "Olmué", "Petorca", "Puchuncaví", "Putaendo", "Quintero", "San Esteban",
                    "Santo Domingo", "Zapallar",
                ],
            ),
            (
                6,
                &[
                    "Rancagua", "Machalí", "Graneros", "San Fernando", "Rengo", "Santa Cruz", "Pichilemu",
                    "Codegua", "Doñihue", "Olivar", "Coinco", "Quinta de Tilcoco", "Chimbarongo",
                ],
            ),
            (
                7,
                &[
                    "Talca", "Curicó", "Linares", "Constitución", "Cauquenes", "Parral", "San Javier",
                    "Licantén", "Rauco", "San Rafael", "Río Claro", "Villa Alegre", "Yerbas Buenas",
                    "Curepto",
                ],
            ),
            (
                8,
                &[
                    "Concepción", "Talcahuano", "Coronel", "Chiguayante", "Los Ángeles", "Lebu", "Arauco",
                    "Hualpén", "Hualqui", "Lota", "Penco", "San Pedro de la Paz", "Tomé", "San Rosendo",
                    "Negrete",
                ],
            ),
            (
                9,
                &[
                    "Temuco", "Padre Las Casas", "Villarrica", "Angol", "Victoria", "Pucón", "Lautaro",
                    "Renaico", "Ercilla", "Perquenco", "Cholchol", "Nueva Imperial", "Saavedra",
                    "Teodoro Schmidt", "Pitrufquén",
                ],
            ),
            (
                10,
                &[
                    "Puerto Montt", "Osorno", "Castro", "Ancud", "Puerto Varas", "Frutillar", "Calbuco",
                    "San Juan de la Costa", "Quemchi", "Dalcahue", "Curaco de Vélez", "Puqueldón",
                    "Quinchao", "Queilén",
                ],
            ),
            (11, &["Coyhaique", "Aysén", "Chile Chico", "Cochrane", "Cisnes"]),
            (
                12,
                &[
                    "Punta Arenas", "Natales", "Porvenir", "Cabo de Hornos", "Torres del Paine",
                    "Laguna Blanca", "San Gregorio",
                ],
            ),
            (
                13,
                &[
                    "Santiago", "Cerrillos", "Cerro Navia", "Conchalí", "El Bosque", "Estación Central",
                    "Huechuraba", "Independencia", "La Cisterna", "La Florida", "La Granja", "La Pintana",
                    "La Reina", "Las Condes", "Lo Barnechea", "Lo Espejo", "Lo Prado", "Macul", "Maipú",
                    "Ñuñoa", "Pedro Aguirre Cerda", "Peñalolén", "Providencia", "Pudahuel", "Quilicura",
                    "Quinta Normal", "Recoleta", "Renca", "San Joaquín", "San Miguel", "San Ramón",
                    "Vitacura", "Puente Alto", "Pirque", "San José de Maipo", "Colina", "Lampa", "Tiltil",
                    "San Bernardo", "Buin", "Calera de Tango", "Paine", "Melipilla", "Alhué", "Curacaví",
                    "María Pinto", "San Pedro", "Talagante", "El Monte", "Isla de Maipo", "Padre Hurtado",
                    "Peñaflor",
                ],
            ),
            (14, &["Valdivia", "La Unión", "Río Bueno", "Panguipulli", "Paillaco", "Los Lagos"]),
            (15, &["Arica", "Putre", "General Lagos", "Camarones"]),
            (
                16,
                &[
                    "Chillán", "Chillán Viejo", "San Carlos", "Bulnes", "Yungay", "Pemuco", "Ñiquén",
                    "Cobquecura", "Quirihue", "Treguaco", "Coelemu",
                ],
            ),
        ];
        Catalog {
            regions: table
                .iter()
                .map(|(r, names)| CatalogRegion {
                    region: RegionId(*r),
                    communes: names.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
            unplaced: vec![],
        }
    }
}

/// A named metropolitan area: a curated subset of one region's units.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MetroArea {
    pub id: String,
    pub name: String,
    pub region: RegionId,
    pub communes: Vec<String>,
}

/// A macro-zone made of whole regions.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub name: String,
    pub regions: Vec<RegionId>,
    #[serde(default)]
    pub excluded_communes: Vec<String>,
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_metro_areas() -> Vec<MetroArea> {
    vec![
        MetroArea {
            id: "gran_santiago".to_string(),
            name: "Gran Santiago".to_string(),
            region: RegionId(13),
            communes: strings(&[
                "Cerrillos", "Cerro Navia", "Conchalí", "El Bosque", "Estación Central", "Huechuraba",
                "Independencia", "La Cisterna", "La Florida", "La Granja", "Providencia", "Las Condes",
                "La Reina", "Lo Espejo", "Lo Prado", "Macul", "Maipú", "Ñuñoa", "Padre Hurtado",
                "Pedro Aguirre Cerda", "Peñalolén", "Vitacura", "Pudahuel", "Puente Alto", "Quilicura",
                "Quinta Normal", "Recoleta", "Renca", "San Bernardo", "San Joaquín", "San Miguel",
                "San Ramón", "Santiago", "Lo Barnechea",
            ]),
        },
        MetroArea {
            id: "gran_valparaiso".to_string(),
            name: "Gran Valparaíso".to_string(),
            region: RegionId(5),
            communes: strings(&["Valparaíso", "Viña del Mar", "Concón", "Quilpué", "Villa Alemana"]),
        },
        MetroArea {
            id: "gran_concepcion".to_string(),
            name: "Gran Concepción".to_string(),
            region: RegionId(8),
            communes: strings(&[
                "Concepción", "Coronel", "Chiguayante", "Hualpén", "Hualqui", "Lota", "Penco",
                "San Pedro de la Paz", "Talcahuano", "Tomé",
            ]),
        },
    ]
}

fn default_zones() -> Vec<Zone> {
    let islands = strings(&["Isla de Pascua", "Juan Fernández"]);
    let zone = |name: &str, ids: &[u8]| Zone {
        name: name.to_string(),
        regions: ids.iter().map(|r| RegionId(*r)).collect(),
        excluded_communes: islands.clone(),
    };
    vec![
        zone("Norte", &[15, 1, 2, 3, 4]),
        zone("Centro", &[5, 6, 7, 8, 13, 16]),
        zone("Sur", &[9, 10, 11, 12, 14]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_lookup_exact_alias_numeric_and_partial() {
        let table = RegionTable::default();
        let n = Normalizer::new(&AliasTable::default());
        assert_eq!(table.lookup("Metropolitana", &n), Some(RegionId(13)));
        assert_eq!(table.lookup("METROPOLITANA DE SANTIAGO", &n), Some(RegionId(13)));
        assert_eq!(table.lookup("Bio Bío", &n), Some(RegionId(8)));
        assert_eq!(table.lookup("Libertador", &n), Some(RegionId(6)));
        assert_eq!(table.lookup("Araucania", &n), Some(RegionId(9)));
        assert_eq!(table.lookup("13", &n), Some(RegionId(13)));
        assert_eq!(table.lookup("XIV", &n), Some(RegionId(14)));
        assert_eq!(table.lookup("Región 5", &n), Some(RegionId(5)));
        assert_eq!(table.lookup("Región de Los Lagos", &n), Some(RegionId(10)));
        assert_eq!(table.lookup("Provincia de Maule Sur", &n), Some(RegionId(7)));
        assert_eq!(table.lookup("Atlantis", &n), None);
        assert_eq!(table.lookup("", &n), None);
        assert_eq!(table.lookup("99", &n), None);
    }

    #[test]
    fn catalog_add_deduplicates_by_key() {
        let n = Normalizer::plain();
        let mut c = Catalog::default();
        assert!(!c.add("NUNOA", Some(RegionId(13)), &n));
        assert!(c.add("Atlantis", Some(RegionId(13)), &n));
        assert!(!c.add("santiago", None, &n));
        assert!(c.add("Springfield", None, &n));
        assert!(!c.add("springfield", None, &n));
        assert!(c.add("Nueva", Some(RegionId(42)), &n));
        assert_eq!(c.communes(RegionId(42)), &["Nueva".to_string()]);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let s: Settings =
            serde_json::from_str(r#"{"classifier": {"tieBand": 0.5}, "parser": {"defaultRegion": 13}}"#)
                .unwrap();
        assert_eq!(s.classifier.tie_band, 0.5);
        assert_eq!(s.classifier.band_width, 10.0);
        assert_eq!(s.parser.default_region, Some(RegionId(13)));
        assert_eq!(s.parser.encodings.len(), 3);
        assert_eq!(s.regions.0.len(), 16);
        assert_eq!(s.metro_areas.len(), 3);
    }

    #[test]
    fn validation_catches_bad_values() {
        assert!(Settings::default().validate().is_ok());
        assert!(matches!(
            Settings::from_json(r#"{"classifier": {"tieBand": 12.0}}"#),
            Err(ConfigError::Bands { .. })
        ));
        assert!(matches!(
            Settings::from_json(r#"{"parser": {"defaultRegion": 42}}"#),
            Err(ConfigError::UnknownRegion { .. })
        ));
        assert!(matches!(
            Settings::from_json(r#"{"parser": {"encodings": []}}"#),
            Err(ConfigError::NoEncoding)
        ));
        assert!(matches!(Settings::from_json("{"), Err(ConfigError::Json { .. })));
    }

    #[test]
    fn defaults_cover_every_region() {
        let s = Settings::default();
        for id in s.regions.ids() {
            assert!(s.geo.bounds(id).is_some(), "no bounds for {}", id);
            assert!(!s.catalog.communes(id).is_empty(), "no communes for {}", id);
        }
    }
}
