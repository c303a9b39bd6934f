//! Human-readable report rendering for terminal output.
//!
//! Produces a colored summary of the inventory: overall statistics, the
//! operating system breakdown, and the reconstructed group tree.
use std::collections::HashSet;

use colored::*;

use crate::{
    inventory::Inventory,
    stats::{calculate_statistics, os_breakdown},
};

fn visible_len(s: &str) -> usize {
    // Strip ANSI escape sequences (\x1b[ ... m) to compute printable width
    let mut len = 0;
    let mut iter = s.chars().peekable();
    while let Some(ch) = iter.next() {
        if ch == '\u{1b}' {
            if let Some('[') = iter.peek().cloned() {
                let _ = iter.next();
            }
            for c in iter.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            len += 1;
        }
    }
    len
}

fn section_header(title: &str) -> String {
    let len = visible_len(title);
    let mut s = String::new();
    s.push('\n');
    s.push_str(title);
    s.push('\n');
    s.push_str(&"─".repeat(len));
    s.push_str("\n\n");
    s
}

pub fn render_summary(inv: &Inventory) -> String {
    render_summary_with_top(inv, 10)
}

pub fn render_summary_with_top(inv: &Inventory, top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n",
        "LDAP Inventory: OU Hierarchy Summary".bold().cyan()
    ));

    let stats = calculate_statistics(inv);
    out.push_str(&section_header(
        &"Inventory Statistics".bold().yellow().to_string(),
    ));
    out.push_str(&format!("Groups: {}\n", stats.group_count));
    out.push_str(&format!("Root Groups: {}\n", stats.root_group_count));
    out.push_str(&format!("Hosts: {}\n", stats.host_count));
    out.push_str(&format!("Hosts Without OS: {}\n", stats.hosts_without_os));
    out.push_str(&format!("Empty Groups: {}\n", stats.empty_groups));
    match &stats.largest_group {
        Some((key, n)) => out.push_str(&format!("Largest Group: {} ({} hosts)\n", key, n)),
        None => out.push_str("Largest Group: (none)\n"),
    }

    out.push_str(&section_header(
        &"Operating Systems".bold().magenta().to_string(),
    ));
    let top = os_breakdown(inv, top_n);
    if top.is_empty() {
        out.push_str("(No hosts)\n");
    }
    for (os, count) in top {
        out.push_str(&format!("  {}: {}\n", os, count));
    }

    out.push_str(&section_header(&"Group Tree".bold().cyan().to_string()));
    if inv.group_count() == 0 {
        out.push_str("(No groups)\n");
    }
    let mut seen = HashSet::new();
    for root in inv.roots() {
        let mut branch = HashSet::new();
        render_group(inv, root, 0, &mut branch, &mut seen, &mut out);
    }
    // groups only reachable through a cycle have no root above them
    let keys: Vec<&str> = inv.groups().map(|(k, _)| k.as_str()).collect();
    for key in keys {
        if !seen.contains(key) {
            let mut branch = HashSet::new();
            render_group(inv, key, 0, &mut branch, &mut seen, &mut out);
        }
    }
    out
}

fn render_group<'a>(
    inv: &'a Inventory,
    key: &'a str,
    depth: usize,
    branch: &mut HashSet<&'a str>,
    seen: &mut HashSet<&'a str>,
    out: &mut String,
) {
    let indent = "  ".repeat(depth);
    if !branch.insert(key) {
        out.push_str(&format!("{}[{}] {}\n", indent, key.bold(), "(cycle)".red()));
        return;
    }
    seen.insert(key);
    out.push_str(&format!("{}[{}]\n", indent, key.bold()));
    if let Some(group) = inv.group(key) {
        for host in group.hosts() {
            out.push_str(&format!("{}  {}\n", indent, host.green()));
        }
        for child in group.children() {
            render_group(inv, child, depth + 1, branch, seen, out);
        }
    }
    branch.remove(key);
}
