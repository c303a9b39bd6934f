//! Statistical summaries over a built inventory.
//!
//! `InventoryStats` carries counts for the terminal report; `os_breakdown`
//! ranks operating systems by host count.
use std::collections::HashMap;

use crate::inventory::Inventory;

/// Label used for hosts without an `operatingSystem` attribute.
pub const UNKNOWN_OS: &str = "(unknown)";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InventoryStats {
    pub group_count: usize,
    pub root_group_count: usize,
    pub host_count: usize,
    pub hosts_without_os: usize,
    pub empty_groups: usize,
    /// Group with the most direct hosts, ties broken by key.
    pub largest_group: Option<(String, usize)>,
}

pub fn calculate_statistics(inv: &Inventory) -> InventoryStats {
    let mut largest: Option<(String, usize)> = None;
    let mut empty_groups = 0;
    for (key, group) in inv.groups() {
        let n = group.hosts().len();
        if n == 0 {
            empty_groups += 1;
            continue;
        }
        // groups iterate in key order, so strict > keeps the first key on ties
        if largest.as_ref().is_none_or(|(_, best)| n > *best) {
            largest = Some((key.clone(), n));
        }
    }
    InventoryStats {
        group_count: inv.group_count(),
        root_group_count: inv.roots().len(),
        host_count: inv.host_count(),
        hosts_without_os: inv.hosts().filter(|(_, h)| h.os_name.is_none()).count(),
        empty_groups,
        largest_group: largest,
    }
}

/// Top-N operating systems by host count, sorted descending by count then
/// ascending by name. Hosts without OS information count as [`UNKNOWN_OS`].
pub fn os_breakdown(inv: &Inventory, top_n: usize) -> Vec<(String, usize)> {
    use std::cmp::Reverse;
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for (_, host) in inv.hosts() {
        let os = host.os_name.as_deref().unwrap_or(UNKNOWN_OS);
        *freq.entry(os).or_insert(0) += 1;
    }
    let mut items: Vec<(String, usize)> = freq
        .into_iter()
        .map(|(os, n)| (os.to_string(), n))
        .collect();
    items.sort_by(|a, b| (Reverse(a.1), &a.0).cmp(&(Reverse(b.1), &b.0)));
    items.truncate(top_n);
    items
}
