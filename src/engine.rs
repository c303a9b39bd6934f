//! Engine: drives LDIF search results through selection, normalization and
//! inventory registration.
//!
//! Every record is normalized before anything is registered, so the first
//! normalization failure aborts the load without committing partial state
//! for that record. The parallel loader reads and normalizes with rayon but
//! registers on the calling thread in input order, giving the same inventory
//! as the sequential path.
//!
//! Typical usage:
//!
//! ```no_run
//! use ldap_inventory::config::InventoryConfig;
//! use ldap_inventory::engine::Engine;
//! use ldap_inventory::filter::{RecordFilter, SearchScope};
//! # fn main() -> anyhow::Result<()> {
//! let mut config = InventoryConfig::from_env()?;
//! config.search_root = Some("OU=Servers,DC=corp,DC=local".into());
//! let mut engine = Engine::new(config, RecordFilter::new(SearchScope::Subtree))?;
//! engine.load_from_file_paths(&["/path/to/export.ldif"])?;
//! println!("{}", engine.inventory().to_json_pretty()?);
//! # Ok(())
//! # }
//! ```
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};
use rayon::prelude::*;

use crate::config::{ConfigError, InventoryConfig};
use crate::dn::DistinguishedName;
use crate::entry::RawEntry;
use crate::filter::{RecordFilter, Rejection};
use crate::inventory::{Inventory, InventoryBuilder};
use crate::io::{DEFAULT_MMAP_THRESHOLD_BYTES, iter_lines_auto};
use crate::ldif::{LdifStats, parse_ldif_lines, parse_ldif_str};
use crate::normalize::{Normalized, normalize_entry};

/// Counters collected during a load.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseStats {
    pub ldif: LdifStats,
    pub records: usize,
    pub registered: usize,
    pub not_computer: usize,
    pub out_of_scope: usize,
    pub os_mismatch: usize,
}

impl ParseStats {
    fn reject(&mut self, why: Rejection) {
        match why {
            Rejection::NotComputer => self.not_computer += 1,
            Rejection::OutOfScope => self.out_of_scope += 1,
            Rejection::OsMismatch => self.os_mismatch += 1,
        }
    }
}

#[derive(Debug)]
pub struct Engine {
    config: InventoryConfig,
    search_root: DistinguishedName,
    filter: RecordFilter,
    builder: InventoryBuilder,
    pub parse_stats: Option<ParseStats>,
}

impl Engine {
    /// Fails when the configuration has no usable search root.
    pub fn new(config: InventoryConfig, filter: RecordFilter) -> Result<Self, ConfigError> {
        let search_root = config.search_root_dn()?;
        let builder = InventoryBuilder::new(&config);
        Ok(Self {
            config,
            search_root,
            filter,
            builder,
            parse_stats: None,
        })
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    pub fn search_root(&self) -> &DistinguishedName {
        &self.search_root
    }

    pub fn inventory(&self) -> Inventory {
        self.builder.snapshot()
    }

    /// Load LDIF documents already in memory.
    pub fn load_from_strings(&mut self, ldifs: &[&str]) -> Result<()> {
        let mut entries = Vec::new();
        let mut ldif_stats = LdifStats::default();
        for text in ldifs {
            let (parsed, stats) = parse_ldif_str(text);
            entries.extend(parsed);
            ldif_stats.merge(stats);
        }
        self.load_entries(entries, ldif_stats, false)
    }

    /// Load raw entries, e.g. from a directory client.
    pub fn load_from_entries(&mut self, entries: Vec<RawEntry>) -> Result<()> {
        self.load_entries(entries, LdifStats::default(), false)
    }

    /// Stream LDIF files (or `-` for stdin) using buffered reads, switching
    /// to mmap for files at or above `mmap_threshold_bytes`.
    pub fn load_from_file_paths_with_threshold<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        mmap_threshold_bytes: u64,
    ) -> Result<()> {
        let mut entries = Vec::new();
        let mut ldif_stats = LdifStats::default();
        for p in paths {
            let (parsed, stats) = read_ldif_file(p.as_ref(), mmap_threshold_bytes)?;
            entries.extend(parsed);
            ldif_stats.merge(stats);
        }
        self.load_entries(entries, ldif_stats, false)
    }

    /// Convenience wrapper that uses the default mmap threshold.
    pub fn load_from_file_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<()> {
        self.load_from_file_paths_with_threshold(paths, DEFAULT_MMAP_THRESHOLD_BYTES)
    }

    /// Read files and normalize records in parallel; registration stays
    /// sequential and in input order.
    pub fn load_from_file_paths_parallel_with_threshold<P: AsRef<Path> + Sync>(
        &mut self,
        paths: &[P],
        mmap_threshold_bytes: u64,
    ) -> Result<()> {
        let per_file: Vec<(Vec<RawEntry>, LdifStats)> = paths
            .par_iter()
            .map(|p| read_ldif_file(p.as_ref(), mmap_threshold_bytes))
            .collect::<Result<_>>()?;
        let mut entries = Vec::new();
        let mut ldif_stats = LdifStats::default();
        for (parsed, stats) in per_file {
            entries.extend(parsed);
            ldif_stats.merge(stats);
        }
        self.load_entries(entries, ldif_stats, true)
    }

    fn load_entries(
        &mut self,
        entries: Vec<RawEntry>,
        ldif_stats: LdifStats,
        parallel: bool,
    ) -> Result<()> {
        let mut stats = ParseStats {
            ldif: ldif_stats,
            records: entries.len(),
            ..Default::default()
        };
        let mut selected = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.filter.check(&entry, &self.search_root) {
                Ok(()) => selected.push(entry),
                Err(why) => {
                    debug!("skipping {} ({:?})", entry.dn, why);
                    stats.reject(why);
                }
            }
        }

        let root = &self.search_root;
        let fqdn = self.config.use_fqdn_display;
        let normalize = |e: &RawEntry| {
            normalize_entry(e, root, fqdn).with_context(|| format!("cannot place {}", e.dn))
        };
        let normalized: Vec<Normalized> = if parallel {
            selected.par_iter().map(normalize).collect::<Result<_>>()?
        } else {
            selected.iter().map(normalize).collect::<Result<_>>()?
        };

        for n in &normalized {
            self.builder.register_path(&n.path, Some(&n.host));
        }
        stats.registered = normalized.len();
        info!(
            "registered {} of {} records under {}",
            stats.registered, stats.records, self.search_root
        );

        let merged = match self.parse_stats.take() {
            Some(prev) => merge_stats(prev, stats),
            None => stats,
        };
        self.parse_stats = Some(merged);
        Ok(())
    }
}

fn read_ldif_file(path: &Path, mmap_threshold_bytes: u64) -> Result<(Vec<RawEntry>, LdifStats)> {
    let lines = iter_lines_auto(path, mmap_threshold_bytes)?;
    let parsed =
        parse_ldif_lines(lines).with_context(|| format!("read LDIF {}", path.display()))?;
    debug!("read {} entries from {}", parsed.0.len(), path.display());
    Ok(parsed)
}

fn merge_stats(mut a: ParseStats, b: ParseStats) -> ParseStats {
    a.ldif.merge(b.ldif);
    a.records += b.records;
    a.registered += b.registered;
    a.not_computer += b.not_computer;
    a.out_of_scope += b.out_of_scope;
    a.os_mismatch += b.os_mismatch;
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigOverrides;
    use crate::filter::SearchScope;
    use crate::normalize::NormalizeError;

    const ROOT: &str = "OU=Servers,OU=Site,DC=Example,DC=Com";

    const LDIF: &str = "\
dn: CN=WEB1,OU=Web,OU=Servers,OU=Site,DC=Example,DC=Com
objectClass: computer
cn: WEB1
distinguishedName: CN=WEB1,OU=Web,OU=Servers,OU=Site,DC=Example,DC=Com
dNSHostName: web1.example.com
operatingSystem: Windows Server 2019 Standard

dn: CN=WEB2,OU=Web,OU=Servers,OU=Site,DC=Example,DC=Com
objectClass: computer
cn: WEB2
distinguishedName: CN=WEB2,OU=Web,OU=Servers,OU=Site,DC=Example,DC=Com
dNSHostName: web2.example.com
operatingSystem: CentOS Linux

dn: OU=Web,OU=Servers,OU=Site,DC=Example,DC=Com
objectClass: organizationalUnit

dn: CN=DC1,OU=Servers,OU=Site,DC=Example,DC=Com
objectClass: computer
cn: DC1
distinguishedName: CN=DC1,OU=Servers,OU=Site,DC=Example,DC=Com
dNSHostName: dc1.example.com
";

    fn engine(scope: SearchScope, overrides: ConfigOverrides) -> Engine {
        let config = InventoryConfig::default().with_overrides(ConfigOverrides {
            search_root: Some(ROOT.into()),
            ..overrides
        });
        Engine::new(config, RecordFilter::new(scope)).unwrap()
    }

    #[test]
    fn builds_hierarchy_from_ldif() {
        let mut e = engine(SearchScope::Subtree, ConfigOverrides::default());
        e.load_from_strings(&[LDIF]).unwrap();
        let inv = e.inventory();
        assert_eq!(inv.group("servers").unwrap().children(), ["web"]);
        assert_eq!(inv.group("servers").unwrap().hosts(), ["DC1"]);
        assert_eq!(inv.group("web").unwrap().hosts(), ["WEB1", "WEB2"]);
        let stats = e.parse_stats.unwrap();
        assert_eq!(stats.records, 4);
        assert_eq!(stats.registered, 3);
        assert_eq!(stats.not_computer, 1);
    }

    #[test]
    fn one_level_scope_and_os_filter() {
        let mut e = engine(SearchScope::OneLevel, ConfigOverrides::default());
        e.load_from_strings(&[LDIF]).unwrap();
        let inv = e.inventory();
        assert_eq!(inv.host_count(), 1);
        assert_eq!(inv.group("servers").unwrap().hosts(), ["DC1"]);
        assert_eq!(e.parse_stats.unwrap().out_of_scope, 2);

        let config = InventoryConfig::default().with_overrides(ConfigOverrides {
            search_root: Some(ROOT.into()),
            use_fqdn_display: Some(true),
            ..Default::default()
        });
        let filter = RecordFilter::new(SearchScope::Subtree)
            .with_os_pattern("*win*")
            .unwrap();
        let mut e = Engine::new(config, filter).unwrap();
        e.load_from_strings(&[LDIF]).unwrap();
        let inv = e.inventory();
        assert_eq!(inv.host_count(), 1);
        assert!(inv.host_vars("web1.example.com").is_some());
        assert_eq!(e.parse_stats.unwrap().os_mismatch, 2);
    }

    #[test]
    fn computers_outside_the_root_are_skipped() {
        let outside = "\
dn: CN=PC1,OU=Desktops,OU=Site,DC=Example,DC=Com
objectClass: computer
cn: PC1
distinguishedName: CN=PC1,OU=Desktops,OU=Site,DC=Example,DC=Com
dNSHostName: pc1.example.com
";
        for (scope, hosts, skipped) in [(SearchScope::Subtree, 3, 1), (SearchScope::OneLevel, 1, 3)] {
            let mut e = engine(scope, ConfigOverrides::default());
            e.load_from_strings(&[LDIF, outside]).unwrap();
            let inv = e.inventory();
            assert_eq!(inv.host_count(), hosts);
            assert!(inv.host_vars("PC1").is_none());
            assert!(inv.group("desktops").is_none());
            assert_eq!(e.parse_stats.unwrap().out_of_scope, skipped);
        }
    }

    #[test]
    fn missing_attribute_aborts_without_partial_state() {
        let bad = "\
dn: CN=NONAME,OU=Db,OU=Servers,OU=Site,DC=Example,DC=Com
cn: NONAME
distinguishedName: CN=NONAME,OU=Db,OU=Servers,OU=Site,DC=Example,DC=Com
";
        let mut e = engine(SearchScope::Subtree, ConfigOverrides::default());
        let err = e.load_from_strings(&[LDIF, bad]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NormalizeError>(),
            Some(NormalizeError::MissingAttribute {
                attribute: "dNSHostName",
                ..
            })
        ));
        let inv = e.inventory();
        assert!(inv.group("db").is_none());
        assert_eq!(inv, Inventory::default());
    }

    #[test]
    fn loads_accumulate_and_stay_idempotent() {
        let mut e = engine(SearchScope::Subtree, ConfigOverrides::default());
        e.load_from_strings(&[LDIF]).unwrap();
        let once = e.inventory();
        e.load_from_strings(&[LDIF]).unwrap();
        assert_eq!(e.inventory(), once);
        assert_eq!(e.parse_stats.unwrap().records, 8);
    }

    #[test]
    fn parallel_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.ldif");
        let b = dir.path().join("b.ldif");
        std::fs::write(&a, LDIF).unwrap();
        std::fs::write(
            &b,
            "dn: CN=APP1,OU=App,OU=Servers,OU=Site,DC=Example,DC=Com\n\
             cn: APP1\n\
             distinguishedName: CN=APP1,OU=App,OU=Servers,OU=Site,DC=Example,DC=Com\n\
             dNSHostName: app1.example.com\n",
        )
        .unwrap();
        let paths = [a, b];
        let mut seq = engine(SearchScope::Subtree, ConfigOverrides::default());
        seq.load_from_file_paths_with_threshold(&paths, 1).unwrap();
        let mut par = engine(SearchScope::Subtree, ConfigOverrides::default());
        par.load_from_file_paths_parallel_with_threshold(&paths, u64::MAX)
            .unwrap();
        assert_eq!(seq.inventory(), par.inventory());
        assert_eq!(seq.inventory().group("servers").unwrap().children(), ["web", "app"]);
    }

    #[test]
    fn requires_search_root() {
        let err = Engine::new(InventoryConfig::default(), RecordFilter::default()).unwrap_err();
        assert_eq!(err, ConfigError::MissingSearchRoot);
    }
}
