//! Typed search filters.
//!
//! Filters are built as values and rendered to RFC 4515 text only at the
//! protocol boundary, so user input is always escaped. The in-memory
//! directory evaluates the same values with [`Filter::matches`].

use std::cmp::Ordering;
use std::fmt;

use crate::entry::LdapEntry;

/// A search filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `(attr=value)`
    Equals(String, String),
    /// `(attr=*value*)`
    Contains(String, String),
    /// `(attr=value*)`
    StartsWith(String, String),
    /// `(attr>=value)`
    GreaterOrEqual(String, String),
    /// `(attr<=value)`
    LessOrEqual(String, String),
    /// `(attr=*)`
    Present(String),
    /// `(&...)`
    And(Vec<Filter>),
    /// `(|...)`
    Or(Vec<Filter>),
    /// `(!...)`
    Not(Box<Filter>),
}

impl Filter {
    /// Equality match.
    #[must_use]
    pub fn equals(attr: &str, value: impl Into<String>) -> Self {
        Self::Equals(attr.to_string(), value.into())
    }

    /// Substring match anywhere in the value.
    #[must_use]
    pub fn contains(attr: &str, value: impl Into<String>) -> Self {
        Self::Contains(attr.to_string(), value.into())
    }

    /// Prefix match.
    #[must_use]
    pub fn starts_with(attr: &str, value: impl Into<String>) -> Self {
        Self::StartsWith(attr.to_string(), value.into())
    }

    /// Ordering match, inclusive lower bound.
    #[must_use]
    pub fn ge(attr: &str, value: impl Into<String>) -> Self {
        Self::GreaterOrEqual(attr.to_string(), value.into())
    }

    /// Ordering match, inclusive upper bound.
    #[must_use]
    pub fn le(attr: &str, value: impl Into<String>) -> Self {
        Self::LessOrEqual(attr.to_string(), value.into())
    }

    /// Presence match.
    #[must_use]
    pub fn present(attr: &str) -> Self {
        Self::Present(attr.to_string())
    }

    /// Object class equality.
    #[must_use]
    pub fn object_class(oc: &str) -> Self {
        Self::equals("objectClass", oc)
    }

    /// Conjunction.
    #[must_use]
    pub fn and(filters: impl IntoIterator<Item = Self>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Disjunction.
    #[must_use]
    pub fn or(filters: impl IntoIterator<Item = Self>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    /// Negation.
    #[must_use]
    pub fn negate(filter: Self) -> Self {
        Self::Not(Box::new(filter))
    }

    /// Renders the filter as RFC 4515 text.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Evaluates the filter against an entry.
    ///
    /// Attribute names and values compare case-insensitively. Ordering
    /// matches compare numerically when both sides are integers and
    /// lexically otherwise, which orders ISO dates correctly.
    #[must_use]
    pub fn matches(&self, entry: &LdapEntry) -> bool {
        match self {
            Self::Equals(attr, value) => any_value(entry, attr, |v| v.eq_ignore_ascii_case(value)),
            Self::Contains(attr, value) => {
                let needle = value.to_lowercase();
                any_value(entry, attr, |v| v.to_lowercase().contains(&needle))
            }
            Self::StartsWith(attr, value) => {
                let needle = value.to_lowercase();
                any_value(entry, attr, |v| v.to_lowercase().starts_with(&needle))
            }
            Self::GreaterOrEqual(attr, value) => {
                any_value(entry, attr, |v| compare_values(v, value) != Ordering::Less)
            }
            Self::LessOrEqual(attr, value) => {
                any_value(entry, attr, |v| compare_values(v, value) != Ordering::Greater)
            }
            Self::Present(attr) => attr.eq_ignore_ascii_case("objectClass") || entry.has_attr(attr),
            Self::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Self::Not(filter) => !filter.matches(entry),
        }
    }
}

fn any_value(entry: &LdapEntry, attr: &str, pred: impl Fn(&str) -> bool) -> bool {
    entry
        .get_attrs(attr)
        .is_some_and(|values| values.iter().any(|v| pred(v)))
}

fn compare_values(left: &str, right: &str) -> Ordering {
    match (left.parse::<i64>(), right.parse::<i64>()) {
        (Ok(l), Ok(r)) => l.cmp(&r),
        _ => left.to_lowercase().cmp(&right.to_lowercase()),
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(attr, value) => write!(f, "({attr}={})", escape(value)),
            Self::Contains(attr, value) => write!(f, "({attr}=*{}*)", escape(value)),
            Self::StartsWith(attr, value) => write!(f, "({attr}={}*)", escape(value)),
            Self::GreaterOrEqual(attr, value) => write!(f, "({attr}>={})", escape(value)),
            Self::LessOrEqual(attr, value) => write!(f, "({attr}<={})", escape(value)),
            Self::Present(attr) => write!(f, "({attr}=*)"),
            Self::And(filters) => write_compound(f, '&', filters),
            Self::Or(filters) => write_compound(f, '|', filters),
            Self::Not(filter) => write!(f, "(!{filter})"),
        }
    }
}

fn write_compound(f: &mut fmt::Formatter<'_>, op: char, filters: &[Filter]) -> fmt::Result {
    write!(f, "({op}")?;
    for filter in filters {
        write!(f, "{filter}")?;
    }
    f.write_str(")")
}

/// Escapes special characters in filter values.
#[must_use]
pub fn escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\5c"),
            '*' => result.push_str("\\2a"),
            '(' => result.push_str("\\28"),
            ')' => result.push_str("\\29"),
            '\0' => result.push_str("\\00"),
            _ => result.push(c),
        }
    }
    result
}
