// Classification of a vote difference into the ordered color scale.

use std::fmt::Display;

use log::debug;
use serde::Serialize;
use snafu::{ensure, Snafu};

use crate::config::ClassifierBands;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClassifyError {
    #[snafu(display("difference {value} is outside [-100, 100]"))]
    OutOfDomain { value: f64 },
    #[snafu(display("invalid band layout: tie band {tie_band}, band width {band_width}"))]
    InvalidBands { tie_band: f64, band_width: f64 },
}

/// The thirteen buckets, from the strongest Kast margin to the strongest Jara margin.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorBucket {
    KastLandslide,
    KastDominant,
    KastLarge,
    KastWide,
    KastStrong,
    KastLight,
    Tie,
    JaraLight,
    JaraStrong,
    JaraWide,
    JaraLarge,
    JaraDominant,
    JaraLandslide,
}

pub const ALL_BUCKETS: [ColorBucket; 13] = [
    ColorBucket::KastLandslide,
    ColorBucket::KastDominant,
    ColorBucket::KastLarge,
    ColorBucket::KastWide,
    ColorBucket::KastStrong,
    ColorBucket::KastLight,
    ColorBucket::Tie,
    ColorBucket::JaraLight,
    ColorBucket::JaraStrong,
    ColorBucket::JaraWide,
    ColorBucket::JaraLarge,
    ColorBucket::JaraDominant,
    ColorBucket::JaraLandslide,
];

const PALETTE: [&str; 13] = [
    "#0F2D5C", "#1A3D7C", "#2A58A6", "#3D76D1", "#5E91E8", "#8BB2F0", "#9CA3AF", "#F8A0A0",
    "#F28787", "#E86969", "#DA4A4A", "#C92A2A", "#B91C1C",
];

impl ColorBucket {
    /// Position on the scale, 0 (Kast landslide) to 12 (Jara landslide).
    pub fn index(self) -> usize {
        ALL_BUCKETS.iter().position(|b| *b == self).unwrap_or(6)
    }

    pub fn color(self) -> &'static str {
        PALETTE[self.index()]
    }

    pub fn label(self) -> &'static str {
        match self {
            ColorBucket::KastLandslide => "Kast landslide",
            ColorBucket::KastDominant => "Kast dominant",
            ColorBucket::KastLarge => "Kast large",
            ColorBucket::KastWide => "Kast wide",
            ColorBucket::KastStrong => "Kast strong",
            ColorBucket::KastLight => "Kast light",
            ColorBucket::Tie => "Technical tie",
            ColorBucket::JaraLight => "Jara light",
            ColorBucket::JaraStrong => "Jara strong",
            ColorBucket::JaraWide => "Jara wide",
            ColorBucket::JaraLarge => "Jara large",
            ColorBucket::JaraDominant => "Jara dominant",
            ColorBucket::JaraLandslide => "Jara landslide",
        }
    }
}

impl Display for ColorBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Maps `jara_pct - kast_pct` to a bucket.
///
/// `|d| <= tie_band` is a tie. Otherwise the step is `floor(|d| / band_width)`,
/// capped at 5, and the bucket lies `step + 1` positions away from the tie on
/// the side of the leader. The scale is symmetric around 0.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    bands: ClassifierBands,
}

impl Classifier {
    pub fn new(bands: &ClassifierBands) -> Result<Classifier, ClassifyError> {
        ensure!(
            bands.tie_band.is_finite()
                && bands.band_width.is_finite()
                && bands.tie_band >= 0.0
                && bands.band_width > bands.tie_band,
            InvalidBandsSnafu {
                tie_band: bands.tie_band,
                band_width: bands.band_width
            }
        );
        debug!("Classifier::new: {:?}", bands);
        Ok(Classifier { bands: *bands })
    }

    pub fn tie_band(&self) -> f64 {
        self.bands.tie_band
    }

    pub fn classify(&self, diff: f64) -> Result<ColorBucket, ClassifyError> {
        ensure!(
            diff.is_finite() && diff.abs() <= 100.0,
            OutOfDomainSnafu { value: diff }
        );
        let magnitude = diff.abs();
        if magnitude <= self.bands.tie_band {
            return Ok(ColorBucket::Tie);
        }
        let step = ((magnitude / self.bands.band_width).floor() as usize).min(5);
        let idx = if diff > 0.0 { 6 + step + 1 } else { 6 - step - 1 };
        Ok(ALL_BUCKETS[idx])
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Classifier {
            bands: ClassifierBands::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_values() {
        let c = Classifier::default();
        assert_eq!(c.classify(11.0).unwrap(), ColorBucket::JaraStrong);
        assert_eq!(c.classify(-4.0).unwrap(), ColorBucket::KastLight);
        assert_eq!(c.classify(0.0).unwrap(), ColorBucket::Tie);
        assert_eq!(c.classify(1.0).unwrap(), ColorBucket::Tie);
        assert_eq!(c.classify(-1.0).unwrap(), ColorBucket::Tie);
        assert_eq!(c.classify(1.01).unwrap(), ColorBucket::JaraLight);
        assert_eq!(c.classify(9.99).unwrap(), ColorBucket::JaraLight);
        assert_eq!(c.classify(10.0).unwrap(), ColorBucket::JaraStrong);
        assert_eq!(c.classify(49.9).unwrap(), ColorBucket::JaraDominant);
        assert_eq!(c.classify(50.0).unwrap(), ColorBucket::JaraLandslide);
        assert_eq!(c.classify(100.0).unwrap(), ColorBucket::JaraLandslide);
        assert_eq!(c.classify(-100.0).unwrap(), ColorBucket::KastLandslide);
        assert_eq!(c.classify(-25.0).unwrap(), ColorBucket::KastWide);
    }

    #[test]
    fn symmetric_and_monotone() {
        let c = Classifier::default();
        let mut prev = c.classify(-100.0).unwrap();
        let mut d = -100.0;
        while d <= 100.0 {
            let b = c.classify(d).unwrap();
            assert!(b >= prev, "not monotone at {}", d);
            let mirror = c.classify(-d).unwrap();
            assert_eq!(b.index() + mirror.index(), 12, "not symmetric at {}", d);
            prev = b;
            d += 0.25;
        }
    }

    #[test]
    fn rejects_out_of_domain() {
        let c = Classifier::default();
        assert!(matches!(c.classify(100.5), Err(ClassifyError::OutOfDomain { .. })));
        assert!(matches!(c.classify(f64::NAN), Err(ClassifyError::OutOfDomain { .. })));
        assert!(matches!(c.classify(f64::NEG_INFINITY), Err(ClassifyError::OutOfDomain { .. })));
    }

    #[test]
    fn custom_bands() {
        let c = Classifier::new(&ClassifierBands {
            tie_band: 2.0,
            band_width: 5.0,
        })
        .unwrap();
        assert_eq!(c.classify(1.5).unwrap(), ColorBucket::Tie);
        assert_eq!(c.classify(-6.0).unwrap(), ColorBucket::KastStrong);
        assert_eq!(c.classify(30.0).unwrap(), ColorBucket::JaraLandslide);
        assert!(Classifier::new(&ClassifierBands {
            tie_band: 5.0,
            band_width: 5.0,
        })
        .is_err());
    }

    #[test]
    fn palette_runs_blue_to_red() {
        assert_eq!(ColorBucket::KastLandslide.color(), "#0F2D5C");
        assert_eq!(ColorBucket::Tie.color(), "#9CA3AF");
        assert_eq!(ColorBucket::JaraLandslide.color(), "#B91C1C");
        assert_eq!(ColorBucket::JaraDominant.index(), 11);
    }
}
