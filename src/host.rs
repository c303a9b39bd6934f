//! Host descriptor model for directory computer objects.
//!
//! A `HostDescriptor` is built once per search result by
//! [`crate::normalize::normalize`] and never mutated afterwards. Its serde
//! form is the hostvars record written under `_meta.hostvars` in the
//! inventory document, so field names follow the downstream inventory
//! contract (`name`, `cn`, `dn`, `osname`, `osversion`, `inventory_name`).
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Identity and metadata for one directory computer object.
pub struct HostDescriptor {
    /// DNS host name (`dNSHostName`).
    pub name: String,
    #[serde(rename = "cn")]
    pub common_name: String,
    /// Value of the `distinguishedName` attribute.
    #[serde(rename = "dn")]
    pub distinguished_name: String,
    #[serde(rename = "osname", skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    #[serde(rename = "osversion", skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    /// Identifier the host is listed under in groups and hostvars.
    #[serde(rename = "inventory_name")]
    pub display_name: String,
}

impl HostDescriptor {
    /// Build a descriptor, choosing the display name from the DNS name when
    /// `use_fqdn_display` is set and from the common name otherwise.
    pub fn new(
        name: &str,
        common_name: &str,
        distinguished_name: &str,
        use_fqdn_display: bool,
    ) -> Self {
        let display_name = if use_fqdn_display {
            name.to_string()
        } else {
            common_name.to_string()
        };
        Self {
            name: name.to_string(),
            common_name: common_name.to_string(),
            distinguished_name: distinguished_name.to_string(),
            os_name: None,
            os_version: None,
            display_name,
        }
    }

    pub fn with_os(mut self, os_name: Option<&str>, os_version: Option<&str>) -> Self {
        self.os_name = os_name.map(str::to_string);
        self.os_version = os_version.map(str::to_string);
        self
    }
}
