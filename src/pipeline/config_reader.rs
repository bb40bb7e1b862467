use log::{debug, info};
use snafu::prelude::*;

use std::fs;
use std::path::{Path, PathBuf};

use runoff_reconcile::{RegionId, Settings};

use crate::args::Args;
use crate::pipeline::*;

/// Reads a settings file. Missing keys keep their default value.
pub fn read_settings(path: &str) -> MapResult<Settings> {
    let contents = fs::read_to_string(path).context(ReadingFileSnafu { path })?;
    debug!("read_settings: {} bytes from {}", contents.len(), path);
    Settings::from_json(&contents).context(SettingsSnafu { path })
}

/// The settings of a run: the configuration file if any, then the command line on top.
///
/// A relative boundary directory in the configuration file is taken relative to
/// the file itself.
pub fn settings_for_args(args: &Args) -> MapResult<Settings> {
    let mut settings = match &args.config {
        Some(path) => {
            let mut s = read_settings(path)?;
            if s.geo.boundary_dir.is_relative() {
                let root = Path::new(path).parent().unwrap_or_else(|| Path::new("."));
                s.geo.boundary_dir = root.join(&s.geo.boundary_dir);
            }
            info!("settings read from {}", path);
            s
        }
        None => Settings::default(),
    };
    if let Some(dir) = &args.boundaries {
        settings.geo.boundary_dir = PathBuf::from(dir);
    }
    if let Some(r) = args.default_region {
        settings.parser.default_region = Some(RegionId(r));
    }
    settings.validate().context(SettingsSnafu {
        path: "command line",
    })?;
    debug!(
        "settings_for_args: boundary dir {}",
        settings.geo.boundary_dir.display()
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("runoffmap_cfg_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn file_then_command_line() {
        let dir = scratch("layers");
        let path = dir.join("settings.json");
        fs::write(
            &path,
            r#"{"classifier": {"tieBand": 2.0}, "geo": {"boundaryDir": "shapes"}}"#,
        )
        .unwrap();
        let mut args = Args {
            config: Some(path.display().to_string()),
            ..Args::default()
        };
        let s = settings_for_args(&args).unwrap();
        assert_eq!(s.classifier.tie_band, 2.0);
        assert_eq!(s.classifier.band_width, 10.0);
        assert_eq!(s.geo.boundary_dir, dir.join("shapes"));
        assert_eq!(s.parser.default_region, None);

        args.boundaries = Some("/srv/boundaries".to_string());
        args.default_region = Some(13);
        let s = settings_for_args(&args).unwrap();
        assert_eq!(s.geo.boundary_dir, PathBuf::from("/srv/boundaries"));
        assert_eq!(s.parser.default_region, Some(RegionId(13)));
    }

    #[test]
    fn bad_settings_are_refused() {
        let dir = scratch("bad");
        let path = dir.join("settings.json");
        fs::write(&path, r#"{"classifier": {"tieBand": 12.0}}"#).unwrap();
        let args = Args {
            config: Some(path.display().to_string()),
            ..Args::default()
        };
        assert!(matches!(
            settings_for_args(&args),
            Err(MapError::Settings { .. })
        ));

        let args = Args {
            default_region: Some(17),
            ..Args::default()
        };
        assert!(matches!(
            settings_for_args(&args),
            Err(MapError::Settings { .. })
        ));

        let args = Args {
            config: Some(dir.join("missing.json").display().to_string()),
            ..Args::default()
        };
        assert!(matches!(
            settings_for_args(&args),
            Err(MapError::ReadingFile { .. })
        ));
    }
}
