//! Distinguished name parsing and search-root relative path computation.
//!
//! A DN such as `CN=Host1,OU=Web,OU=Servers,DC=Example,DC=Com` is parsed into
//! an ordered list of [`Rdn`] components, leaf first. All of the index
//! arithmetic that turns an entry DN into an OU path below a search root lives
//! in [`DistinguishedName::group_path_under`].
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DnError {
    #[error("empty distinguished name")]
    Empty,
    #[error("component without '=' separator: {0}")]
    MissingSeparator(String),
    #[error("component with empty attribute type or value: {0}")]
    EmptyValue(String),
    #[error("dangling escape at end of distinguished name: {0}")]
    DanglingEscape(String),
    #[error("{dn} is not located under search root {root}")]
    NotUnderRoot { dn: String, root: String },
    #[error("{dn} has fewer components than search root {root}")]
    TooShort { dn: String, root: String },
}

/// Attribute type of a single RDN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RdnKind {
    Cn,
    Ou,
    Dc,
    Other(String),
}

impl RdnKind {
    fn from_attr(attr: &str) -> Self {
        match attr.to_ascii_uppercase().as_str() {
            "CN" => RdnKind::Cn,
            "OU" => RdnKind::Ou,
            "DC" => RdnKind::Dc,
            _ => RdnKind::Other(attr.to_string()),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            RdnKind::Cn => "CN",
            RdnKind::Ou => "OU",
            RdnKind::Dc => "DC",
            RdnKind::Other(a) => a.as_str(),
        }
    }
}

/// One `type=value` component of a DN, with escapes already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rdn {
    pub kind: RdnKind,
    pub value: String,
}

impl Rdn {
    /// Group-name token: the bare value with spaces replaced by underscores.
    pub fn token(&self) -> String {
        self.value.replace(' ', "_")
    }

    /// Case-insensitive comparison, as directory servers match DNs.
    pub fn matches(&self, other: &Rdn) -> bool {
        self.kind.as_str().eq_ignore_ascii_case(other.kind.as_str())
            && self.value.to_lowercase() == other.value.to_lowercase()
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=", self.kind.as_str())?;
        for ch in self.value.chars() {
            if matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=') {
                write!(f, "\\")?;
            }
            write!(f, "{}", ch)?;
        }
        Ok(())
    }
}

/// Parsed distinguished name. Components are kept leaf first, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedName {
    components: Vec<Rdn>,
}

impl DistinguishedName {
    pub fn parse(input: &str) -> Result<Self, DnError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DnError::Empty);
        }
        let components = split_components(trimmed)?
            .into_iter()
            .map(|raw| parse_component(&raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }

    pub fn components(&self) -> &[Rdn] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The leaf (first written) component.
    pub fn leaf(&self) -> Option<&Rdn> {
        self.components.first()
    }

    /// True when `root`'s components form the tail of this DN.
    pub fn ends_with(&self, root: &DistinguishedName) -> bool {
        if root.len() > self.len() {
            return false;
        }
        let offset = self.len() - root.len();
        self.components[offset..]
            .iter()
            .zip(root.components.iter())
            .all(|(a, b)| a.matches(b))
    }

    /// Strict descendant: ends with `root` and is longer than it.
    pub fn is_descendant_of(&self, root: &DistinguishedName) -> bool {
        self.len() > root.len() && self.ends_with(root)
    }

    /// Direct child of `root` (one-level search scope).
    pub fn is_child_of(&self, root: &DistinguishedName) -> bool {
        self.len() == root.len() + 1 && self.ends_with(root)
    }

    /// Ordered group path of this entry below `root`, outermost first.
    ///
    /// The entry's own leaf is dropped, then `root.len() - 1` components are
    /// dropped from the tail so the root's own leaf becomes the first group,
    /// and the remainder is reversed. An entry sitting exactly at the root
    /// yields the root's leaf as a one-element path.
    pub fn group_path_under(&self, root: &DistinguishedName) -> Result<Vec<String>, DnError> {
        if self.len() < root.len() {
            return Err(DnError::TooShort {
                dn: self.to_string(),
                root: root.to_string(),
            });
        }
        if !self.ends_with(root) {
            return Err(DnError::NotUnderRoot {
                dn: self.to_string(),
                root: root.to_string(),
            });
        }
        let keep_tail = root.len().saturating_sub(1);
        let end = self.len() - keep_tail;
        let mut path: Vec<String> = if end > 1 {
            self.components[1..end].iter().map(Rdn::token).collect()
        } else {
            Vec::new()
        };
        path.reverse();
        if path.is_empty() {
            if let Some(leaf) = root.leaf() {
                path.push(leaf.token());
            }
        }
        Ok(path)
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", rdn)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for DistinguishedName {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Split on unescaped commas (or semicolons). Escaped characters are kept
/// behind an [`ESCAPED`] marker so later stages treat them as literals; hex
/// pairs are decoded as UTF-8 bytes.
fn split_components(input: &str) -> Result<Vec<String>, DnError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut pending: Vec<u8> = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            let Some(next) = chars.next() else {
                return Err(DnError::DanglingEscape(input.to_string()));
            };
            let lo = chars.peek().and_then(|c| c.to_digit(16));
            if let (Some(hi), Some(lo)) = (next.to_digit(16), lo) {
                chars.next();
                pending.push((hi * 16 + lo) as u8);
                continue;
            }
            flush_bytes(&mut pending, &mut current);
            current.push(ESCAPED);
            current.push(next);
            continue;
        }
        flush_bytes(&mut pending, &mut current);
        match ch {
            ',' | ';' => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    flush_bytes(&mut pending, &mut current);
    parts.push(current);
    Ok(parts)
}

fn flush_bytes(pending: &mut Vec<u8>, current: &mut String) {
    if pending.is_empty() {
        return;
    }
    for ch in String::from_utf8_lossy(pending).chars() {
        current.push(ESCAPED);
        current.push(ch);
    }
    pending.clear();
}

// Marks the following char as a literal.
const ESCAPED: char = '\u{0}';

fn parse_component(raw: &str) -> Result<Rdn, DnError> {
    let shown = raw.replace(ESCAPED, "\\");
    let sep = unescaped_position(raw, '=')
        .ok_or_else(|| DnError::MissingSeparator(shown.trim().to_string()))?;
    let attr = raw[..sep].trim();
    let value = trim_unescaped(&raw[sep + 1..]).replace(ESCAPED, "");
    if attr.is_empty() || value.is_empty() {
        return Err(DnError::EmptyValue(shown.trim().to_string()));
    }
    Ok(Rdn {
        kind: RdnKind::from_attr(attr),
        value,
    })
}

fn unescaped_position(raw: &str, needle: char) -> Option<usize> {
    let mut prev = None;
    for (idx, ch) in raw.char_indices() {
        if ch == needle && prev != Some(ESCAPED) {
            return Some(idx);
        }
        prev = Some(ch);
    }
    None
}

/// Trim surrounding spaces, keeping a trailing space that was escaped.
fn trim_unescaped(value: &str) -> &str {
    let mut value = value.trim_start();
    while value.ends_with(' ') {
        let head = &value[..value.len() - 1];
        if head.ends_with(ESCAPED) {
            break;
        }
        value = head;
    }
    value
}
