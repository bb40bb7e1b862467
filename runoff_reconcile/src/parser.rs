// ********* Electoral CSV parsing **********

use std::collections::BTreeMap;
use std::fmt::Display;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt, Snafu};

use crate::config::{ParserSettings, RegionTable};
use crate::encoding::{decode, TextEncoding};
use crate::normalize::Normalizer;
use crate::numeric::{parse_count, parse_percentage, NumericError};
use crate::records::ElectoralRecord;

/// Canonical column of the electoral input.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Commune,
    Region,
    JaraPct,
    KastPct,
    JaraVotes,
    KastVotes,
    BlankVotes,
    NullVotes,
    TotalCast,
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Field::Commune => "comuna",
            Field::Region => "region",
            Field::JaraPct => "jara_pct",
            Field::KastPct => "kast_pct",
            Field::JaraVotes => "jara_votes",
            Field::KastVotes => "kast_votes",
            Field::BlankVotes => "blank_votes",
            Field::NullVotes => "null_votes",
            Field::TotalCast => "total_cast",
        };
        write!(f, "{}", s)
    }
}

/// Failures that abort the whole parse. Row-level problems are reported as
/// `RejectReason` values instead.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ParseError {
    #[snafu(display("the electoral input has no header row"))]
    EmptyInput,
    #[snafu(display("no column matches the required field {field} (headers: {headers:?})"))]
    MissingColumn { field: Field, headers: Vec<String> },
    #[snafu(display("could not read the header row"))]
    Csv { source: csv::Error },
}

/// Why a single row was dropped.
#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RejectReason {
    MissingName,
    InvalidNumber {
        field: Field,
        value: String,
        problem: NumericError,
    },
    OutOfRange {
        field: Field,
        value: f64,
    },
    MissingPercentages,
    NoValidVotes,
    VoteOverflow,
    Unreadable {
        message: String,
    },
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::MissingName => write!(f, "missing commune name"),
            RejectReason::InvalidNumber {
                field,
                value,
                problem,
            } => write!(f, "invalid number in {}: {:?} ({})", field, value, problem),
            RejectReason::OutOfRange { field, value } => {
                write!(f, "out of range: {} = {} (expected 0..=100)", field, value)
            }
            RejectReason::MissingPercentages => {
                write!(f, "no percentages and no vote counts to derive them from")
            }
            RejectReason::NoValidVotes => write!(f, "vote counts add up to zero"),
            RejectReason::VoteOverflow => write!(f, "vote counts too large to add up"),
            RejectReason::Unreadable { message } => write!(f, "unreadable row: {}", message),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct RejectedRow {
    pub line: usize,
    pub raw: String,
    pub reason: RejectReason,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseStats {
    pub rows: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub encoding: Option<TextEncoding>,
    pub degraded: bool,
    pub delimiter: char,
    /// Canonical field -> header text that was matched.
    pub columns: BTreeMap<String, String>,
    /// sha256 of the decoded input.
    pub digest: String,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ParseOutput {
    pub records: Vec<ElectoralRecord>,
    pub rejected: Vec<RejectedRow>,
    pub stats: ParseStats,
}

// Column index of every field found in the header.
#[derive(Debug, Default)]
struct ColumnMap {
    cols: BTreeMap<Field, usize>,
}

impl ColumnMap {
    fn get(&self, field: Field) -> Option<usize> {
        self.cols.get(&field).copied()
    }

    fn has(&self, field: Field) -> bool {
        self.cols.contains_key(&field)
    }
}

/// Turns raw delimited bytes into validated electoral records.
pub struct ElectoralParser<'a> {
    settings: &'a ParserSettings,
    normalizer: &'a Normalizer,
    regions: &'a RegionTable,
}

impl<'a> ElectoralParser<'a> {
    pub fn new(
        settings: &'a ParserSettings,
        normalizer: &'a Normalizer,
        regions: &'a RegionTable,
    ) -> ElectoralParser<'a> {
        ElectoralParser {
            settings,
            normalizer,
            regions,
        }
    }

    pub fn parse(&self, raw: &[u8]) -> Result<ParseOutput, ParseError> {
        let decoded = decode(raw, &self.settings.encodings, self.settings.max_bad_char_ratio);
        let text = decoded.text;
        let header_line = text.lines().find(|l| !l.trim().is_empty());
        let header_line = match header_line {
            Some(l) => l,
            None => return EmptyInputSnafu {}.fail(),
        };
        let delimiter = detect_delimiter(header_line);
        debug!("parse: delimiter {:?}, encoding {:?}", delimiter as char, decoded.encoding);

        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());
        let headers: Vec<String> = rdr
            .headers()
            .context(CsvSnafu {})?
            .iter()
            .map(|h| h.to_string())
            .collect();
        ensure!(headers.iter().any(|h| !h.is_empty()), EmptyInputSnafu {});
        let columns = self.resolve_columns(&headers)?;

        let mut records: Vec<ElectoralRecord> = Vec::new();
        let mut rejected: Vec<RejectedRow> = Vec::new();
        let mut rows = 0;
        for row in rdr.records() {
            rows += 1;
            match row {
                Ok(rec) => {
                    let line = rec.position().map(|p| p.line() as usize).unwrap_or(rows + 1);
                    match self.read_row(&rec, &columns, line) {
                        Ok(r) => {
                            debug!("parse: line {} accepted: {:?}", line, r.unit_name);
                            records.push(r)
                        }
                        Err(reason) => {
                            warn!("parse: line {} rejected: {}", line, reason);
                            let raw = rec
                                .iter()
                                .collect::<Vec<&str>>()
                                .join(&(delimiter as char).to_string());
                            rejected.push(RejectedRow { line, raw, reason });
                        }
                    }
                }
                Err(e) => {
                    let line = e.position().map(|p| p.line() as usize).unwrap_or(rows + 1);
                    warn!("parse: line {} unreadable: {}", line, e);
                    rejected.push(RejectedRow {
                        line,
                        raw: String::new(),
                        reason: RejectReason::Unreadable {
                            message: e.to_string(),
                        },
                    });
                }
            }
        }

        let stats = ParseStats {
            rows,
            accepted: records.len(),
            rejected: rejected.len(),
            encoding: decoded.encoding,
            degraded: decoded.degraded,
            delimiter: delimiter as char,
            columns: columns
                .cols
                .iter()
                .map(|(f, idx)| (f.to_string(), headers[*idx].clone()))
                .collect(),
            digest: sha256::digest(text.as_str()),
        };
        info!(
            "parse: {} rows, {} accepted, {} rejected",
            stats.rows, stats.accepted, stats.rejected
        );
        Ok(ParseOutput {
            records,
            rejected,
            stats,
        })
    }

    fn resolve_columns(&self, headers: &[String]) -> Result<ColumnMap, ParseError> {
        let mut map = ColumnMap::default();
        for (idx, h) in headers.iter().enumerate() {
            let key = self.normalizer.normalize(h);
            if key.name().is_empty() {
                continue;
            }
            let found = self.settings.columns.iter().find(|c| {
                c.synonyms
                    .iter()
                    .any(|s| self.normalizer.normalize(s).name() == key.name())
            });
            match found {
                Some(c) if !map.has(c.field) => {
                    debug!("resolve_columns: {:?} -> {}", h, c.field);
                    map.cols.insert(c.field, idx);
                }
                Some(c) => debug!("resolve_columns: {:?} duplicates {}, ignored", h, c.field),
                None => debug!("resolve_columns: {:?} is not a known column", h),
            }
        }

        let missing = |field: Field| MissingColumnSnafu {
            field,
            headers: headers.to_vec(),
        };
        ensure!(map.has(Field::Commune), missing(Field::Commune));
        let pct = map.has(Field::JaraPct) && map.has(Field::KastPct);
        let votes = map.has(Field::JaraVotes) && map.has(Field::KastVotes);
        if !pct && !votes {
            let field = if map.has(Field::JaraVotes) {
                Field::KastVotes
            } else if map.has(Field::KastVotes) {
                Field::JaraVotes
            } else if map.has(Field::JaraPct) {
                Field::KastPct
            } else {
                Field::JaraPct
            };
            return missing(field).fail();
        }
        Ok(map)
    }

    fn read_row(
        &self,
        rec: &StringRecord,
        columns: &ColumnMap,
        line: usize,
    ) -> Result<ElectoralRecord, RejectReason> {
        let cell = |field: Field| columns.get(field).and_then(|i| rec.get(i));

        let unit_name = cell(Field::Commune).unwrap_or("").to_string();
        if self.normalizer.normalize(&unit_name).name().is_empty() {
            return Err(RejectReason::MissingName);
        }

        let pct = |field: Field| -> Result<Option<f64>, RejectReason> {
            match cell(field) {
                None => Ok(None),
                Some(v) => parse_percentage(v).map_err(|problem| RejectReason::InvalidNumber {
                    field,
                    value: v.to_string(),
                    problem,
                }),
            }
        };
        let count = |field: Field| -> Result<Option<u64>, RejectReason> {
            match cell(field) {
                None => Ok(None),
                Some(v) => parse_count(v).map_err(|problem| RejectReason::InvalidNumber {
                    field,
                    value: v.to_string(),
                    problem,
                }),
            }
        };

        let jara_pct = pct(Field::JaraPct)?;
        let kast_pct = pct(Field::KastPct)?;
        for (field, v) in [(Field::JaraPct, jara_pct), (Field::KastPct, kast_pct)] {
            if let Some(v) = v {
                if !(0.0..=100.0).contains(&v) {
                    return Err(RejectReason::OutOfRange { field, value: v });
                }
            }
        }
        let jara_votes = count(Field::JaraVotes)?;
        let kast_votes = count(Field::KastVotes)?;
        let total_cast = count(Field::TotalCast)?;
        let blank = count(Field::BlankVotes)?;
        let null = count(Field::NullVotes)?;

        // A lone percentage is not trusted: both shares come from the votes.
        let (jara_pct, kast_pct, derived_pct) = match (jara_pct, kast_pct) {
            (Some(j), Some(k)) => (j, k, false),
            (j, k) => match (jara_votes, kast_votes) {
                (Some(jv), Some(kv)) => {
                    let total = jv.checked_add(kv).ok_or(RejectReason::VoteOverflow)?;
                    if total == 0 {
                        return Err(RejectReason::NoValidVotes);
                    }
                    if j.is_some() || k.is_some() {
                        debug!("read_row: line {}: single percentage, derived from votes", line);
                    }
                    (
                        jv as f64 * 100.0 / total as f64,
                        kv as f64 * 100.0 / total as f64,
                        true,
                    )
                }
                _ => return Err(RejectReason::MissingPercentages),
            },
        };

        let (region, region_text) = match cell(Field::Region).filter(|t| !t.is_empty()) {
            Some(text) => {
                let region = self.regions.lookup(text, self.normalizer);
                if region.is_none() {
                    warn!("read_row: line {}: unknown region {:?}", line, text);
                }
                (region, Some(text.to_string()))
            }
            None => (self.settings.default_region, None),
        };

        Ok(ElectoralRecord {
            line,
            unit_name,
            region,
            region_text,
            jara_pct,
            kast_pct,
            jara_votes,
            kast_votes,
            total_cast,
            blank,
            null,
            derived_pct,
        })
    }
}

// The more frequent of ';' and ',' outside quotes. Ties go to ','.
fn detect_delimiter(header: &str) -> u8 {
    let mut in_quotes = false;
    let (mut semis, mut commas) = (0, 0);
    for c in header.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => semis += 1,
            ',' if !in_quotes => commas += 1,
            _ => {}
        }
    }
    if semis > commas {
        b';'
    } else {
        b','
    }
}
