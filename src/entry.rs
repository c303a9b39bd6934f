use std::collections::BTreeMap;

/// One directory search result: the entry DN plus its attributes.
///
/// Attribute names are stored lower-cased so lookups are case-insensitive,
/// matching LDAP attribute description semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub dn: String,
    attributes: BTreeMap<String, Vec<String>>,
}

impl RawEntry {
    pub fn new(dn: &str) -> Self {
        Self {
            dn: dn.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style helper, mostly for tests and programmatic callers.
    pub fn with(mut self, attr: &str, value: &str) -> Self {
        self.push(attr, value);
        self
    }

    pub fn push(&mut self, attr: &str, value: &str) {
        self.attributes
            .entry(attr.to_ascii_lowercase())
            .or_default()
            .push(value.to_string());
    }

    pub fn values(&self, attr: &str) -> &[String] {
        self.attributes
            .get(&attr.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First value of `attr`, if any.
    pub fn first(&self, attr: &str) -> Option<&str> {
        self.values(attr).first().map(String::as_str)
    }

    pub fn has(&self, attr: &str) -> bool {
        !self.values(attr).is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for RawEntry
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    /// Collects `("dn", ..)` into the DN and everything else into attributes.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut entry = RawEntry::default();
        for (k, v) in iter {
            if k.as_ref().eq_ignore_ascii_case("dn") {
                entry.dn = v.as_ref().to_string();
            } else {
                entry.push(k.as_ref(), v.as_ref());
            }
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_ignore_attribute_case() {
        let e = RawEntry::new("CN=A,DC=x")
            .with("dNSHostName", "a.x")
            .with("objectClass", "top")
            .with("objectclass", "computer");
        assert_eq!(e.first("dnshostname"), Some("a.x"));
        assert_eq!(e.values("OBJECTCLASS"), &["top", "computer"]);
        assert!(!e.has("operatingSystem"));
    }

    #[test]
    fn collects_from_pairs() {
        let e: RawEntry = [("dn", "CN=B,DC=x"), ("cn", "B")].into_iter().collect();
        assert_eq!(e.dn, "CN=B,DC=x");
        assert_eq!(e.first("cn"), Some("B"));
        assert!(!e.has("dn"));
    }
}
