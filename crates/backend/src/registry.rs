//! Site registry - the fixed list of sites eligible for indexing.

use std::collections::HashSet;

use tracing::warn;

use crate::domain::{config::Config, site::SiteDescriptor};

/// Source of the sites an indexing run covers.
pub trait SiteRegistry: Send + Sync {
  /// All sites, in submission order.
  fn list_sites(&self) -> Vec<SiteDescriptor>;

  /// Find a site by exact (case-sensitive) URL.
  fn find(&self, url: &str) -> Option<SiteDescriptor> {
    self.list_sites().into_iter().find(|site| site.matches(url))
  }
}

/// Registry backed by the `[[sites]]` tables of the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigRegistry {
  sites: Vec<SiteDescriptor>,
}

impl ConfigRegistry {
  /// Build a registry from `sites`, keeping the first entry for each URL.
  pub fn new(sites: Vec<SiteDescriptor>) -> Self {
    let mut seen = HashSet::new();
    let sites = sites
      .into_iter()
      .filter(|site| {
        let first = seen.insert(site.url.clone());
        if !first {
          warn!(name = %site.name, url = %site.url, "Ignoring duplicate site url");
        }
        first
      })
      .collect();
    Self { sites }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(config.sites.clone())
  }

  pub fn len(&self) -> usize {
    self.sites.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sites.is_empty()
  }
}

impl SiteRegistry for ConfigRegistry {
  fn list_sites(&self) -> Vec<SiteDescriptor> {
    self.sites.clone()
  }

  fn find(&self, url: &str) -> Option<SiteDescriptor> {
    self.sites.iter().find(|site| site.matches(url)).cloned()
  }
}
