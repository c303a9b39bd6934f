//! Export helpers for writing the inventory to files.
//!
//! - `save_inventory_json` writes the full inventory document.
//! - `save_hosts_csv` writes one row per host with its metadata and the
//!   groups it is listed in.
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use csv::Writer;

use crate::inventory::Inventory;

pub fn save_inventory_json<P: AsRef<Path>>(inv: &Inventory, path: P) -> Result<()> {
    let mut f = File::create(path)?;
    serde_json::to_writer_pretty(&mut f, inv)?;
    writeln!(f)?;
    Ok(())
}

pub fn save_hosts_csv<P: AsRef<Path>>(inv: &Inventory, path: P) -> Result<()> {
    let mut wtr = Writer::from_path(path)?;
    wtr.write_record([
        "inventory_name",
        "name",
        "cn",
        "dn",
        "osname",
        "osversion",
        "groups",
    ])?;
    for (display_name, host) in inv.hosts() {
        let groups = inv.groups_of(display_name).join(";");
        wtr.write_record([
            display_name.as_str(),
            host.name.as_str(),
            host.common_name.as_str(),
            host.distinguished_name.as_str(),
            host.os_name.as_deref().unwrap_or(""),
            host.os_version.as_deref().unwrap_or(""),
            groups.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
