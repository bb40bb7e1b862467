use log::{debug, info, warn};

use runoff_reconcile::builder::ResolverBuilder;
use runoff_reconcile::*;
use snafu::{prelude::*, Snafu};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::args::Args;
use crate::pipeline::config_reader::*;
use crate::pipeline::export::*;

pub mod config_reader;
pub mod export;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MapError {
    #[snafu(display("Error reading file {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing CSV file {path}"))]
    WritingCsv { source: csv::Error, path: String },
    #[snafu(display("Invalid JSON in {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Could not serialize the {what}"))]
    SerializingJson {
        source: serde_json::Error,
        what: String,
    },
    #[snafu(display("Invalid settings in {path}"))]
    Settings { source: ConfigError, path: String },
    #[snafu(display("Could not set up the boundary sources"))]
    Sources { source: SourceError },
    #[snafu(display("The reconciliation failed"))]
    Pipeline { source: PipelineError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type MapResult<T> = Result<T, MapError>;

/// The files written by one run.
#[derive(Debug, Clone)]
pub struct Written {
    pub geojson: PathBuf,
    pub csv: PathBuf,
    pub summaries: PathBuf,
    pub diagnostics: PathBuf,
}

impl Written {
    fn in_dir(dir: &Path) -> Written {
        Written {
            geojson: dir.join("merged.geojson"),
            csv: dir.join("merged.csv"),
            summaries: dir.join("summaries.json"),
            diagnostics: dir.join("diagnostics.json"),
        }
    }
}

fn scope(args: &Args, settings: &Settings) -> MapResult<Option<BTreeSet<RegionId>>> {
    let regions = match &args.regions {
        None => return Ok(None),
        Some(l) => l,
    };
    let mut res = BTreeSet::new();
    for r in regions.iter() {
        let id = RegionId(*r);
        if settings.regions.get(id).is_none() {
            whatever!("Unknown region {} in --regions", r)
        }
        res.insert(id);
    }
    Ok(Some(res))
}

fn report_leftovers(d: &DiagnosticsReport) {
    let c = &d.counts;
    info!(
        "{} rows read, {} rejected, {} boundaries, {} matched",
        c.rows, c.rejected_rows, c.features, c.matched
    );
    for r in d.rejected_rows.iter() {
        warn!("line {} rejected: {}", r.line, r.reason);
    }
    for u in d.unmatched_electoral.iter() {
        warn!("no boundary for {:?} (region {:?})", u.name, u.region);
    }
    for a in d.ambiguous.iter() {
        warn!("ambiguous match for {}: {} candidates", a.key, a.candidates.len());
    }
    if !d.unmatched_geometries.is_empty() {
        info!(
            "{} boundaries without electoral data",
            d.unmatched_geometries.len()
        );
    }
}

pub fn run(args: &Args) -> MapResult<Written> {
    let settings = settings_for_args(args)?;
    debug!("settings: {:?}", settings.parser);

    let raw = fs::read(&args.input).context(ReadingFileSnafu {
        path: args.input.clone(),
    })?;
    info!("read {} bytes from {}", raw.len(), args.input);

    let mut builder = ResolverBuilder::new(&settings);
    if args.offline {
        builder = builder.offline();
    }
    let mut resolver = builder.build().context(SourcesSnafu {})?;
    let options = PipelineOptions {
        scope: scope(args, &settings)?,
        cover_records: true,
    };
    let outcome =
        reconcile_dataset(&raw, &settings, &mut resolver, &options).context(PipelineSnafu {})?;
    report_leftovers(&outcome.diagnostics);

    let out_dir = PathBuf::from(args.out.clone().unwrap_or_else(|| ".".to_string()));
    fs::create_dir_all(&out_dir).context(WritingFileSnafu {
        path: out_dir.display().to_string(),
    })?;
    let written = Written::in_dir(&out_dir);
    write_geojson(&written.geojson, &outcome.merged)?;
    write_flat_csv(&written.csv, &outcome.merged)?;
    write_json(&written.diagnostics, &outcome.diagnostics, "diagnostics")?;
    let pretty_summaries = write_json(&written.summaries, &outcome.summaries, "summaries")?;
    info!("outputs written to {}", out_dir.display());

    // The reference summaries, if provided for comparison
    if let Some(reference) = &args.reference {
        check_reference(&pretty_summaries, reference)?;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "comuna;region;jara_pct;kast_pct\n\
                       Santiago;Metropolitana;55,5;44,5\n\
                       Ñuñoa;XIII;48,0;52,0\n\
                       Atlantis;13;150;10\n";

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("runoffmap_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn args_in(dir: &Path) -> Args {
        let input = dir.join("results.csv");
        fs::write(&input, CSV).unwrap();
        Args {
            input: input.display().to_string(),
            out: Some(dir.join("out").display().to_string()),
            boundaries: Some(dir.display().to_string()),
            regions: Some(vec![13]),
            offline: true,
            ..Args::default()
        }
    }

    #[test]
    fn offline_run_writes_everything() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = scratch("all");
        let written = run(&args_in(&dir)).unwrap();

        let geo: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&written.geojson).unwrap()).unwrap();
        assert_eq!(geo["type"], "FeatureCollection");
        let features = geo["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        let stgo = features
            .iter()
            .find(|f| f["properties"]["name"] == "Santiago")
            .unwrap();
        assert_eq!(stgo["properties"]["bucket"], 8);
        assert_eq!(stgo["properties"]["color"], "#F28787");
        assert_eq!(stgo["properties"]["source"], "synthetic");
        assert_eq!(stgo["geometry"]["type"], "MultiPolygon");

        let diag: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&written.diagnostics).unwrap()).unwrap();
        assert_eq!(diag["counts"]["rejectedRows"], 1);
        assert_eq!(diag["rejectedRows"][0]["line"], 4);

        let flat = fs::read_to_string(&written.csv).unwrap();
        assert_eq!(flat.lines().count(), 3);
        assert!(flat.starts_with("name,region,"));
    }

    #[test]
    fn reference_mismatch_fails() {
        let dir = scratch("reference");
        let mut args = args_in(&dir);
        let written = run(&args).unwrap();

        args.reference = Some(written.summaries.display().to_string());
        assert!(run(&args).is_ok());

        let other = dir.join("other.json");
        fs::write(&other, r#"{"regions": []}"#).unwrap();
        args.reference = Some(other.display().to_string());
        assert!(run(&args).is_err());
    }

    #[test]
    fn unknown_region_is_refused() {
        let dir = scratch("region");
        let mut args = args_in(&dir);
        args.regions = Some(vec![13, 42]);
        let err = run(&args).unwrap_err();
        assert!(err.to_string().contains("42"));
    }
}
