use std::path::Path;
use std::time::Duration;

use log::debug;

use crate::boundary::{Fetch, HttpFetch, OfflineFetch, Resolver, SourceError, Tier};
use crate::config::Settings;
use crate::records::RegionId;

/// A builder for the boundary resolver.
///
/// ```
/// use runoff_reconcile::builder::ResolverBuilder;
/// use runoff_reconcile::Settings;
///
/// let resolver = ResolverBuilder::new(&Settings::default())
///     .offline()
///     .boundary_dir("/tmp/boundaries")
///     .known_unit("Springfield", None)
///     .build()?;
/// let resolution = resolver.resolve(None);
/// assert!(!resolution.features.is_empty());
///
/// # Ok::<(), runoff_reconcile::SourceError>(())
/// ```
pub struct ResolverBuilder {
    settings: Settings,
    fetcher: Option<Box<dyn Fetch>>,
    offline: bool,
    tiers: Vec<Tier>,
    extra_units: Vec<(String, Option<RegionId>)>,
}

impl ResolverBuilder {
    pub fn new(settings: &Settings) -> ResolverBuilder {
        ResolverBuilder {
            settings: settings.clone(),
            fetcher: None,
            offline: false,
            tiers: Tier::chain(),
            extra_units: Vec::new(),
        }
    }

    /// No network access: remote tiers fail and fall through.
    pub fn offline(mut self) -> ResolverBuilder {
        self.offline = true;
        self
    }

    pub fn fetcher(mut self, fetcher: Box<dyn Fetch>) -> ResolverBuilder {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn boundary_dir<P: AsRef<Path>>(mut self, dir: P) -> ResolverBuilder {
        self.settings.geo.boundary_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Restricts the chain. The order of the tiers is kept as given.
    pub fn tiers(mut self, tiers: &[Tier]) -> ResolverBuilder {
        self.tiers = tiers.to_vec();
        self
    }

    pub fn known_unit(mut self, name: &str, region: Option<RegionId>) -> ResolverBuilder {
        self.extra_units.push((name.to_string(), region));
        self
    }

    pub fn build(self) -> Result<Resolver, SourceError> {
        let fetcher: Box<dyn Fetch> = match (self.fetcher, self.offline) {
            (_, true) => Box::new(OfflineFetch),
            (Some(f), false) => f,
            (None, false) => Box::new(HttpFetch::new(Duration::from_secs(
                self.settings.geo.remote.timeout_secs,
            ))?),
        };
        debug!("ResolverBuilder::build: tiers {:?}", self.tiers);
        let normalizer = self.settings.normalizer();
        let mut resolver = Resolver::from_parts(
            self.settings.geo,
            self.settings.catalog,
            self.settings.metro_areas,
            normalizer,
            fetcher,
            self.tiers,
        );
        for (name, region) in self.extra_units.iter() {
            resolver.add_known_unit(name, *region);
        }
        Ok(resolver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SourceTier;

    #[test]
    fn synthetic_only_chain() {
        let resolver = ResolverBuilder::new(&Settings::default())
            .offline()
            .boundary_dir(std::env::temp_dir().join("runoff_builder_nothing_here"))
            .tiers(&[Tier::Synthetic])
            .known_unit("Springfield", None)
            .build()
            .unwrap();
        let scope = [RegionId(11)].into_iter().collect();
        let res = resolver.resolve(Some(&scope));
        let expected = Settings::default().catalog.communes(RegionId(11)).len() + 1;
        assert_eq!(res.features.len(), expected);
        assert!(res.features.iter().all(|f| f.source == SourceTier::Synthetic));
        assert_eq!(res.diagnostics.tiers.len(), 1);
    }
}
