//! Lookup keys and key validation.

use crate::schema::TableDescriptor;
use crate::types::ID_FIELD;
use std::collections::BTreeSet;
use std::fmt;

/// A declared set of field names whose combined values are unique per row.
///
/// A single-field set is a unique key; more than one field makes a
/// composite key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeySet {
    fields: BTreeSet<String>,
}

impl KeySet {
    /// Creates a key set from field names.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Field names in the set, sorted.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the set has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns true if `field` is part of the set.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Returns true if `candidate` names exactly the fields of this set.
    #[must_use]
    pub fn matches(&self, candidate: &BTreeSet<&str>) -> bool {
        candidate.len() == self.fields.len() && self.fields().all(|f| candidate.contains(f))
    }
}

impl fmt::Display for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.fields().collect();
        if names.len() == 1 {
            f.write_str(names[0])
        } else {
            write!(f, "({})", names.join(", "))
        }
    }
}

/// Returns true if `candidate` is a valid lookup key for `table`.
///
/// A candidate is valid if it contains the identity field, or if it names
/// exactly the fields of one declared key set. A partial key set, or a key
/// set padded with unrelated fields, is not a key.
pub fn is_valid_key<'a, I>(table: &TableDescriptor, candidate: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let candidate: BTreeSet<&str> = candidate.into_iter().collect();
    if candidate.contains(ID_FIELD) {
        return true;
    }
    table.keys().iter().any(|key| key.matches(&candidate))
}
