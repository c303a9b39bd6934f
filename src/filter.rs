//! Client-side record selection applied before normalization.
//!
//! Mirrors the search options of a directory query: only machine accounts,
//! one-level or subtree scope below the search root, and an optional
//! `operatingSystem` substring pattern in LDAP wildcard syntax.
use regex::{Regex, RegexBuilder};

use crate::dn::DistinguishedName;
use crate::entry::RawEntry;
use crate::normalize::ATTR_OPERATING_SYSTEM;

/// `sAMAccountType` value of workstation and server trust accounts.
pub const SAM_MACHINE_ACCOUNT: &str = "805306369";

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("invalid OS pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchScope {
    /// Direct children of the search root only.
    #[default]
    OneLevel,
    Subtree,
}

/// Why a record was not selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotComputer,
    OutOfScope,
    OsMismatch,
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    scope: SearchScope,
    os_pattern: Option<Regex>,
}

impl RecordFilter {
    pub fn new(scope: SearchScope) -> Self {
        Self {
            scope,
            os_pattern: None,
        }
    }

    /// Restrict to entries whose `operatingSystem` matches an LDAP substring
    /// pattern such as `*windows*` (case-insensitive).
    pub fn with_os_pattern(mut self, pattern: &str) -> Result<Self, FilterError> {
        self.os_pattern = Some(ldap_wildcard_regex(pattern)?);
        Ok(self)
    }

    pub fn scope(&self) -> SearchScope {
        self.scope
    }

    /// Decide whether `entry` belongs in the result set. Entries outside the
    /// search root never match, as with a scoped directory search. Entries
    /// whose DN does not parse are passed through so normalization reports
    /// them.
    pub fn check(&self, entry: &RawEntry, root: &DistinguishedName) -> Result<(), Rejection> {
        if !is_machine_account(entry) {
            return Err(Rejection::NotComputer);
        }
        if let Ok(dn) = DistinguishedName::parse(&entry.dn) {
            let in_scope = match self.scope {
                SearchScope::OneLevel => dn.is_child_of(root),
                SearchScope::Subtree => dn.is_descendant_of(root),
            };
            if !in_scope {
                return Err(Rejection::OutOfScope);
            }
        }
        if let Some(re) = &self.os_pattern {
            match entry.first(ATTR_OPERATING_SYSTEM) {
                Some(os) if re.is_match(os) => {}
                _ => return Err(Rejection::OsMismatch),
            }
        }
        Ok(())
    }
}

/// Machine-account check equivalent to `(sAMAccountType=805306369)`.
/// Entries carrying neither `sAMAccountType` nor `objectClass` are assumed to
/// come from an already filtered query.
pub fn is_machine_account(entry: &RawEntry) -> bool {
    if entry.has("sAMAccountType") {
        return entry
            .values("sAMAccountType")
            .iter()
            .any(|v| v.trim() == SAM_MACHINE_ACCOUNT);
    }
    if entry.has("objectClass") {
        return entry
            .values("objectClass")
            .iter()
            .any(|v| v.trim().eq_ignore_ascii_case("computer"));
    }
    true
}

/// Translate an LDAP substring filter value (`*` wildcards) to an anchored,
/// case-insensitive regex.
pub fn ldap_wildcard_regex(pattern: &str) -> Result<Regex, FilterError> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .build()
        .map_err(|source| FilterError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}
