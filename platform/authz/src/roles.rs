use std::collections::BTreeSet;
use std::fmt;

/// Normalized set of role names.
///
/// Every entry is trimmed and lower-cased on the way in, so membership tests
/// are case and whitespace insensitive without further work.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated header value such as `X-Roles`.
    ///
    /// Blank segments are dropped.
    pub fn from_header(raw: &str) -> Self {
        raw.split(',').collect()
    }

    pub fn insert(&mut self, role: &str) -> bool {
        match normalize(role) {
            Some(role) => self.0.insert(role),
            None => false,
        }
    }

    pub fn contains(&self, role: &str) -> bool {
        normalize(role).is_some_and(|role| self.0.contains(&role))
    }

    /// True when both sets share at least one role.
    pub fn intersects(&self, other: &RoleSet) -> bool {
        let (small, large) = if self.0.len() <= other.0.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.0.iter().any(|role| large.0.contains(role))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for RoleSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = RoleSet::new();
        for role in iter {
            set.insert(role);
        }
        set
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.0.iter().cloned().collect::<Vec<_>>().join(",");
        f.write_str(&joined)
    }
}

/// Trim and lower-case a role name. Returns `None` for blank input.
fn normalize(role: &str) -> Option<String> {
    let trimmed = role.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}
