use ahash::AHashSet;
use std::borrow::Cow;

/// Prefix applied to field names that collide with names reserved by the ingestion side.
pub const RESERVED_PREFIX: &str = "cf_";

/// Field names that must be renamed before transmission.
#[derive(Debug, Clone, Default)]
pub struct ReservedFields {
    names: AHashSet<String>,
}

impl ReservedFields {
    /// Parses the comma-separated configuration form, e.g. `"event_type, host"`.
    /// Blank entries are ignored.
    pub fn parse(list: &str) -> Self {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Returns the name to emit for `name`: prefixed when reserved, unchanged otherwise.
    pub fn rename<'a>(&self, name: &'a str) -> Cow<'a, str> {
        if self.contains(name) {
            Cow::Owned(format!("{RESERVED_PREFIX}{name}"))
        } else {
            Cow::Borrowed(name)
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ReservedFields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}
