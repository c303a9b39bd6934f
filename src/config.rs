//! Inventory configuration value object.
//!
//! Precedence, highest first: explicit overrides (CLI arguments), environment
//! variables, built-in defaults. Environment access goes through a lookup
//! function so callers and tests decide where values come from.
use crate::dn::{DistinguishedName, DnError};

pub const ENV_BASEDN: &str = "LDAP_INVENTORY_BASEDN";
pub const ENV_FQDN: &str = "LDAP_INVENTORY_FQDN";
pub const ENV_NO_CHILDREN: &str = "LDAP_INVENTORY_NO_CHILDREN";
pub const ENV_GROUP_PREFIX: &str = "LDAP_INVENTORY_GROUP_PREFIX";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: expected a boolean (true/false/1/0/yes/no/on/off), got {value:?}")]
    InvalidBool { var: &'static str, value: String },
    #[error("no search root given (pass BASEDN or set LDAP_INVENTORY_BASEDN)")]
    MissingSearchRoot,
    #[error("invalid search root: {0}")]
    InvalidSearchRoot(#[from] DnError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryConfig {
    pub search_root: Option<String>,
    /// List hosts by DNS host name instead of common name.
    pub use_fqdn_display: bool,
    /// Link each OU to its sub-OUs as inventory children.
    pub link_children: bool,
    pub group_prefix: Option<String>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            search_root: None,
            use_fqdn_display: false,
            link_children: true,
            group_prefix: None,
        }
    }
}

/// Values given explicitly by the caller. `None` defers to the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub search_root: Option<String>,
    pub use_fqdn_display: Option<bool>,
    pub link_children: Option<bool>,
    pub group_prefix: Option<String>,
}

impl InventoryConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(root) = lookup(ENV_BASEDN).filter(|v| !v.trim().is_empty()) {
            cfg.search_root = Some(root);
        }
        if let Some(v) = lookup(ENV_FQDN) {
            cfg.use_fqdn_display = parse_bool(ENV_FQDN, &v)?;
        }
        if let Some(v) = lookup(ENV_NO_CHILDREN) {
            cfg.link_children = !parse_bool(ENV_NO_CHILDREN, &v)?;
        }
        cfg.group_prefix = non_empty(lookup(ENV_GROUP_PREFIX));
        Ok(cfg)
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(root) = overrides.search_root {
            self.search_root = Some(root);
        }
        if let Some(v) = overrides.use_fqdn_display {
            self.use_fqdn_display = v;
        }
        if let Some(v) = overrides.link_children {
            self.link_children = v;
        }
        if overrides.group_prefix.is_some() {
            self.group_prefix = non_empty(overrides.group_prefix);
        }
        self
    }

    /// Parsed search root; fails when none was configured.
    pub fn search_root_dn(&self) -> Result<DistinguishedName, ConfigError> {
        let root = self
            .search_root
            .as_deref()
            .ok_or(ConfigError::MissingSearchRoot)?;
        Ok(DistinguishedName::parse(root)?)
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: value.to_string(),
        }),
    }
}
