//! Record normalization: one raw directory entry in, one host descriptor and
//! its ordered OU group path out.
//!
//! Normalization is pure. It either produces a complete result or an error,
//! so a failing record never leaves partial state in the inventory builder.
use crate::dn::{DistinguishedName, DnError};
use crate::entry::RawEntry;
use crate::host::HostDescriptor;

pub const ATTR_DNS_HOST_NAME: &str = "dNSHostName";
pub const ATTR_CN: &str = "cn";
pub const ATTR_DISTINGUISHED_NAME: &str = "distinguishedName";
pub const ATTR_OPERATING_SYSTEM: &str = "operatingSystem";
pub const ATTR_OPERATING_SYSTEM_VERSION: &str = "operatingSystemVersion";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("entry {dn} is missing required attribute {attribute}")]
    MissingAttribute { dn: String, attribute: &'static str },
    #[error("malformed distinguished name")]
    MalformedDn(#[from] DnError),
}

/// A normalized record ready for registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub host: HostDescriptor,
    pub path: Vec<String>,
}

/// Normalize using a DN and attributes given separately.
pub fn normalize(
    raw_dn: &str,
    attributes: &RawEntry,
    search_root: &DistinguishedName,
    use_fqdn_display: bool,
) -> Result<Normalized, NormalizeError> {
    let name = required(attributes, raw_dn, ATTR_DNS_HOST_NAME)?;
    let common_name = required(attributes, raw_dn, ATTR_CN)?;
    let distinguished_name = required(attributes, raw_dn, ATTR_DISTINGUISHED_NAME)?;

    let dn = DistinguishedName::parse(raw_dn)?;
    let path = dn.group_path_under(search_root)?;

    let host = HostDescriptor::new(name, common_name, distinguished_name, use_fqdn_display)
        .with_os(
            optional(attributes, ATTR_OPERATING_SYSTEM),
            optional(attributes, ATTR_OPERATING_SYSTEM_VERSION),
        );
    Ok(Normalized { host, path })
}

/// Normalize a [`RawEntry`] using its own DN.
pub fn normalize_entry(
    entry: &RawEntry,
    search_root: &DistinguishedName,
    use_fqdn_display: bool,
) -> Result<Normalized, NormalizeError> {
    normalize(&entry.dn, entry, search_root, use_fqdn_display)
}

fn required<'a>(
    entry: &'a RawEntry,
    dn: &str,
    attribute: &'static str,
) -> Result<&'a str, NormalizeError> {
    match entry.first(attribute) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(NormalizeError::MissingAttribute {
            dn: dn.to_string(),
            attribute,
        }),
    }
}

fn optional<'a>(entry: &'a RawEntry, attribute: &str) -> Option<&'a str> {
    entry.first(attribute)
}
