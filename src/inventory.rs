//! Inventory builder: merges OU paths and hosts into a deduplicated group
//! forest plus the `_meta.hostvars` bucket.
//!
//! The builder is append-only. [`InventoryBuilder::register_path`] is the
//! single mutation entry point and every membership list is a [`MemberSet`],
//! which has no removal operation, so repeated registrations only ever merge.
//!
//! ```
//! use ldap_inventory::config::InventoryConfig;
//! use ldap_inventory::host::HostDescriptor;
//! use ldap_inventory::inventory::InventoryBuilder;
//!
//! let mut b = InventoryBuilder::new(&InventoryConfig::default());
//! let host = HostDescriptor::new("web1.corp", "WEB1", "CN=WEB1,OU=Web,OU=Servers,DC=corp", false);
//! b.register_path(&["Servers", "Web"], Some(&host));
//! let inv = b.snapshot();
//! assert_eq!(inv.group("servers").unwrap().children(), ["web"]);
//! assert_eq!(inv.group("web").unwrap().hosts(), ["WEB1"]);
//! ```
use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::{debug, warn};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::config::InventoryConfig;
use crate::host::HostDescriptor;

/// Reserved top-level key holding host variables.
pub const META_KEY: &str = "_meta";

/// Insertion-ordered set of strings. Serializes as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberSet {
    items: Vec<String>,
    index: HashSet<String>,
}

impl MemberSet {
    /// Insert unless already present; returns whether the value was new.
    pub fn insert(&mut self, value: &str) -> bool {
        if self.index.contains(value) {
            return false;
        }
        self.index.insert(value.to_string());
        self.items.push(value.to_string());
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.index.contains(value)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Serialize for MemberSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

/// One organizational unit in the reconstructed hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupNode {
    hosts: MemberSet,
    vars: BTreeMap<String, String>,
    children: MemberSet,
}

impl GroupNode {
    pub fn hosts(&self) -> &[String] {
        self.hosts.as_slice()
    }

    pub fn children(&self) -> &[String] {
        self.children.as_slice()
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}

/// The accumulated inventory document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    groups: BTreeMap<String, GroupNode>,
    hostvars: BTreeMap<String, HostDescriptor>,
}

impl Inventory {
    pub fn group(&self, key: &str) -> Option<&GroupNode> {
        self.groups.get(key)
    }

    /// Groups ordered by key.
    pub fn groups(&self) -> impl Iterator<Item = (&String, &GroupNode)> {
        self.groups.iter()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn host_vars(&self, display_name: &str) -> Option<&HostDescriptor> {
        self.hostvars.get(display_name)
    }

    /// Host variables ordered by display name.
    pub fn hosts(&self) -> impl Iterator<Item = (&String, &HostDescriptor)> {
        self.hostvars.iter()
    }

    pub fn host_count(&self) -> usize {
        self.hostvars.len()
    }

    /// Keys of the groups listing `display_name` as a host.
    pub fn groups_of(&self, display_name: &str) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|(_, g)| g.hosts.contains(display_name))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Groups that are nobody's child, ordered by key.
    pub fn roots(&self) -> Vec<&str> {
        let linked: BTreeSet<&str> = self
            .groups
            .values()
            .flat_map(|g| g.children.iter().map(String::as_str))
            .collect();
        self.groups
            .keys()
            .map(String::as_str)
            .filter(|k| !linked.contains(k))
            .collect()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Serialize)]
struct Meta<'a> {
    hostvars: &'a BTreeMap<String, HostDescriptor>,
}

impl Serialize for Inventory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len() + 1))?;
        for (key, group) in &self.groups {
            map.serialize_entry(key, group)?;
        }
        map.serialize_entry(
            META_KEY,
            &Meta {
                hostvars: &self.hostvars,
            },
        )?;
        map.end()
    }
}

/// Accumulates groups and hosts for one inventory run.
#[derive(Debug, Clone, Default)]
pub struct InventoryBuilder {
    link_children: bool,
    group_prefix: Option<String>,
    inventory: Inventory,
}

impl InventoryBuilder {
    pub fn new(config: &InventoryConfig) -> Self {
        Self {
            link_children: config.link_children,
            group_prefix: config.group_prefix.clone(),
            inventory: Inventory::default(),
        }
    }

    /// Normalized group key: lower-cased, then prefixed.
    pub fn group_key(&self, name: &str) -> String {
        let lowered = name.to_lowercase();
        match &self.group_prefix {
            Some(prefix) => format!("{}{}", prefix, lowered),
            None => lowered,
        }
    }

    /// Register an OU path (outermost first) and optionally attach a host to
    /// its last group. Each group is created on first reference; consecutive
    /// groups are linked parent to child when child linking is enabled.
    pub fn register_path<S: AsRef<str>>(&mut self, path: &[S], host: Option<&HostDescriptor>) {
        let keys: Vec<String> = path.iter().map(|p| self.group_key(p.as_ref())).collect();
        if keys.iter().any(|k| k == META_KEY) {
            warn!(
                "group name collides with reserved key {}, skipping path {:?}",
                META_KEY, keys
            );
            return;
        }
        for pair in keys.windows(2) {
            self.ensure_group(&pair[0]);
            self.ensure_group(&pair[1]);
            if self.link_children {
                if let Some(parent) = self.inventory.groups.get_mut(&pair[0]) {
                    parent.children.insert(&pair[1]);
                }
            }
        }
        let Some(last) = keys.last() else {
            return;
        };
        self.ensure_group(last);
        if let Some(host) = host {
            if let Some(group) = self.inventory.groups.get_mut(last) {
                group.hosts.insert(&host.display_name);
            }
            self.inventory
                .hostvars
                .insert(host.display_name.clone(), host.clone());
        }
    }

    fn ensure_group(&mut self, key: &str) {
        if !self.inventory.groups.contains_key(key) {
            debug!("new group {}", key);
            self.inventory
                .groups
                .insert(key.to_string(), GroupNode::default());
        }
    }

    pub fn snapshot(&self) -> Inventory {
        self.inventory.clone()
    }

    pub fn into_inventory(self) -> Inventory {
        self.inventory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigOverrides;

    fn builder(link_children: bool, prefix: Option<&str>) -> InventoryBuilder {
        let cfg = InventoryConfig::default().with_overrides(ConfigOverrides {
            link_children: Some(link_children),
            group_prefix: prefix.map(str::to_string),
            ..Default::default()
        });
        InventoryBuilder::new(&cfg)
    }

    fn host(cn: &str) -> HostDescriptor {
        HostDescriptor::new(
            &format!("{}.example.com", cn.to_lowercase()),
            cn,
            &format!("CN={},OU=Servers,DC=Example,DC=Com", cn),
            false,
        )
    }

    fn assert_meta_consistent(inv: &Inventory) {
        let in_groups: BTreeSet<&str> = inv
            .groups()
            .flat_map(|(_, g)| g.hosts().iter().map(String::as_str))
            .collect();
        let in_meta: BTreeSet<&str> = inv.hosts().map(|(k, _)| k.as_str()).collect();
        assert_eq!(in_groups, in_meta);
    }

    #[test]
    fn links_children_and_attaches_host_to_last_group() {
        let mut b = builder(true, None);
        b.register_path(&["Servers", "Web", "Internal"], Some(&host("IIS01")));
        let inv = b.snapshot();
        assert_eq!(inv.group_count(), 3);
        assert_eq!(inv.group("servers").unwrap().children(), ["web"]);
        assert_eq!(inv.group("web").unwrap().children(), ["internal"]);
        assert!(inv.group("servers").unwrap().hosts().is_empty());
        assert_eq!(inv.group("internal").unwrap().hosts(), ["IIS01"]);
        assert_eq!(inv.host_vars("IIS01").unwrap().common_name, "IIS01");
        assert_eq!(inv.roots(), vec!["servers"]);
        assert_meta_consistent(&inv);
    }

    #[test]
    fn registering_twice_is_idempotent() {
        let mut once = builder(true, None);
        once.register_path(&["Servers", "Web"], Some(&host("WEB1")));
        let mut twice = builder(true, None);
        twice.register_path(&["Servers", "Web"], Some(&host("WEB1")));
        twice.register_path(&["Servers", "Web"], Some(&host("WEB1")));
        assert_eq!(once.snapshot(), twice.snapshot());
        assert_eq!(
            once.snapshot().to_json_pretty().unwrap(),
            twice.snapshot().to_json_pretty().unwrap()
        );
    }

    #[test]
    fn merges_shared_prefixes_across_hosts() {
        let mut b = builder(true, None);
        b.register_path(&["Servers", "Web"], Some(&host("WEB1")));
        b.register_path(&["Servers", "Web"], Some(&host("WEB2")));
        b.register_path(&["Servers", "Db"], Some(&host("DB1")));
        b.register_path(&["Servers"], Some(&host("MISC1")));
        let inv = b.snapshot();
        let servers = inv.group("servers").unwrap();
        assert_eq!(servers.children(), ["web", "db"]);
        assert_eq!(servers.hosts(), ["MISC1"]);
        assert_eq!(inv.group("web").unwrap().hosts(), ["WEB1", "WEB2"]);
        assert_eq!(inv.host_count(), 4);
        assert_meta_consistent(&inv);
    }

    #[test]
    fn no_children_mode_keeps_groups_flat() {
        let mut b = builder(false, None);
        b.register_path(&["Servers", "Web", "Internal"], Some(&host("IIS01")));
        b.register_path(&["Servers", "Db"], Some(&host("DB1")));
        let inv = b.snapshot();
        assert_eq!(inv.group_count(), 4);
        assert!(inv.groups().all(|(_, g)| g.children().is_empty()));
        assert_eq!(inv.group("internal").unwrap().hosts(), ["IIS01"]);
        assert_eq!(inv.group("db").unwrap().hosts(), ["DB1"]);
        assert_eq!(inv.roots().len(), 4);
        assert_meta_consistent(&inv);
    }

    #[test]
    fn prefix_and_casing_collapse_to_one_group() {
        let mut b = builder(true, Some("ldap_"));
        b.register_path(&["Web"], Some(&host("WEB1")));
        b.register_path(&["web"], Some(&host("WEB2")));
        let inv = b.snapshot();
        assert_eq!(inv.group_count(), 1);
        assert_eq!(inv.group("ldap_web").unwrap().hosts(), ["WEB1", "WEB2"]);
        assert_eq!(b.group_key("Member_Servers"), "ldap_member_servers");
    }

    #[test]
    fn prefixed_children_use_prefixed_keys() {
        let mut b = builder(true, Some("ldap_"));
        b.register_path(&["Servers", "Web"], Some(&host("WEB1")));
        let inv = b.snapshot();
        assert_eq!(inv.group("ldap_servers").unwrap().children(), ["ldap_web"]);
    }

    #[test]
    fn path_without_host_creates_groups_only() {
        let mut b = builder(true, None);
        b.register_path(&["Servers", "Web"], None);
        let inv = b.snapshot();
        assert_eq!(inv.group_count(), 2);
        assert_eq!(inv.host_count(), 0);
        assert_meta_consistent(&inv);
    }

    #[test]
    fn empty_path_is_a_no_op() {
        let mut b = builder(true, None);
        let empty: [&str; 0] = [];
        b.register_path(&empty, Some(&host("LOST1")));
        assert_eq!(b.snapshot(), Inventory::default());
    }

    #[test]
    fn reserved_meta_group_is_skipped() {
        let mut b = builder(true, None);
        b.register_path(&["_META"], Some(&host("X1")));
        let inv = b.snapshot();
        assert_eq!(inv.group_count(), 0);
        assert_eq!(inv.host_count(), 0);
    }

    #[test]
    fn groups_of_lists_every_membership() {
        let mut b = builder(true, None);
        b.register_path(&["Servers", "Web"], Some(&host("WEB1")));
        b.register_path(&["Legacy"], Some(&host("WEB1")));
        let inv = b.snapshot();
        assert_eq!(inv.groups_of("WEB1"), vec!["legacy", "web"]);
        assert!(inv.groups_of("NOPE").is_empty());
    }

    #[test]
    fn json_document_shape() {
        let mut b = builder(true, Some("ldap_"));
        let h = HostDescriptor::new(
            "web1.example.com",
            "WEB1",
            "CN=WEB1,OU=Web,OU=Servers,DC=Example,DC=Com",
            true,
        )
        .with_os(Some("Windows Server 2019"), None);
        b.register_path(&["Servers", "Web"], Some(&h));
        let json = b.snapshot().to_json_pretty().unwrap();
        insta::assert_snapshot!(json, @r#"
        {
          "ldap_servers": {
            "hosts": [],
            "vars": {},
            "children": [
              "ldap_web"
            ]
          },
          "ldap_web": {
            "hosts": [
              "web1.example.com"
            ],
            "vars": {},
            "children": []
          },
          "_meta": {
            "hostvars": {
              "web1.example.com": {
                "name": "web1.example.com",
                "cn": "WEB1",
                "dn": "CN=WEB1,OU=Web,OU=Servers,DC=Example,DC=Com",
                "osname": "Windows Server 2019",
                "inventory_name": "web1.example.com"
              }
            }
          }
        }
        "#);
    }

    #[test]
    fn empty_inventory_still_has_meta() {
        let b = builder(true, None);
        let json = serde_json::to_string(&b.snapshot()).unwrap();
        assert_eq!(json, r#"{"_meta":{"hostvars":{}}}"#);
    }
}
