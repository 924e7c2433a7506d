//! Group domain model.
//!
//! Directory groups come in three schema families that differ only in which
//! attribute holds membership and whether members are stored by uid or by
//! distinguished name. [`GroupType`] is the closed set of those families and
//! carries the per-family lookup table; [`Group`] is the shared value object.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between the classification prefix and the group name in a `cn`.
pub const PREFIX_SEPARATOR: char = '-';

/// Schema family of a directory group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupType {
    /// `posixGroup`, members stored as uids in `memberUid`.
    Posix,
    /// `groupOfNames`, members stored as DNs in `member`.
    GroupOfNames,
    /// `groupOfUniqueNames`, members stored as DNs in `uniqueMember`.
    GroupOfUniqueNames,
}

impl GroupType {
    /// All supported families, in the order they are matched against entries.
    pub const ALL: [Self; 3] = [Self::Posix, Self::GroupOfUniqueNames, Self::GroupOfNames];

    /// Returns the structural object class of this family.
    #[must_use]
    pub const fn object_class(self) -> &'static str {
        match self {
            Self::Posix => "posixGroup",
            Self::GroupOfNames => "groupOfNames",
            Self::GroupOfUniqueNames => "groupOfUniqueNames",
        }
    }

    /// Returns the attribute that stores membership.
    #[must_use]
    pub const fn member_attribute(self) -> &'static str {
        match self {
            Self::Posix => "memberUid",
            Self::GroupOfNames => "member",
            Self::GroupOfUniqueNames => "uniqueMember",
        }
    }

    /// Returns whether members are referenced by distinguished name.
    #[must_use]
    pub const fn members_are_dns(self) -> bool {
        !matches!(self, Self::Posix)
    }

    /// Detects the family from an entry's object classes.
    ///
    /// Posix wins over the DN-based families when an entry carries several.
    #[must_use]
    pub fn from_object_classes<S: AsRef<str>>(object_classes: &[S]) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| {
            object_classes
                .iter()
                .any(|oc| oc.as_ref().eq_ignore_ascii_case(kind.object_class()))
        })
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.object_class())
    }
}

/// Classification derived from a group's naming convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupClassification {
    /// Administrative group.
    Admin,
    /// Team group.
    Team,
    /// Technical group.
    Technical,
    /// No known convention applies.
    #[default]
    Unknown,
}

/// A directory group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    // === Identity ===
    /// Distinguished name.
    pub dn: String,
    /// Common name, `<prefix>-<name>` by convention.
    pub cn: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,

    // === Schema ===
    /// Schema family.
    pub group_type: GroupType,
    /// Numeric group id, only meaningful for Posix groups.
    pub gid_number: Option<u32>,
    /// Classification derived when the group was read.
    #[serde(default)]
    pub classification: GroupClassification,

    // === Membership ===
    /// Member references, uids or DNs depending on the schema family.
    #[serde(default)]
    pub member_ids: Vec<String>,
}

impl Group {
    /// Creates an empty group.
    #[must_use]
    pub fn new(dn: impl Into<String>, cn: impl Into<String>, group_type: GroupType) -> Self {
        Self {
            dn: dn.into(),
            cn: cn.into(),
            description: String::new(),
            group_type,
            gid_number: None,
            classification: GroupClassification::Unknown,
            member_ids: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the numeric group id.
    #[must_use]
    pub const fn with_gid_number(mut self, gid_number: u32) -> Self {
        self.gid_number = Some(gid_number);
        self
    }

    /// Sets the classification.
    #[must_use]
    pub const fn with_classification(mut self, classification: GroupClassification) -> Self {
        self.classification = classification;
        self
    }

    /// Adds a member reference.
    #[must_use]
    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member_ids.push(member.into());
        self
    }

    /// Returns the classification prefix, empty when the cn has no separator.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.cn
            .split_once(PREFIX_SEPARATOR)
            .map_or("", |(prefix, _)| prefix)
    }

    /// Returns the name part after the first separator, or the whole cn.
    #[must_use]
    pub fn name(&self) -> &str {
        self.cn
            .split_once(PREFIX_SEPARATOR)
            .map_or(self.cn.as_str(), |(_, name)| name)
    }

    /// Returns whether the user is a member, by uid or by distinguished name.
    #[must_use]
    pub fn has_member(&self, uid: &str, dn: &str) -> bool {
        self.member_ids.iter().any(|m| {
            m == uid || (!dn.is_empty() && m.eq_ignore_ascii_case(dn))
        })
    }

    /// Returns the value stored in the membership attribute for a user.
    #[must_use]
    pub fn member_value<'a>(&self, uid: &'a str, dn: &'a str) -> &'a str {
        if self.group_type.members_are_dns() {
            dn
        } else {
            uid
        }
    }

    /// Returns the object classes written for this group.
    #[must_use]
    pub fn object_classes(&self) -> Vec<&'static str> {
        vec!["top", self.group_type.object_class()]
    }

    /// Returns whether the group is classified as administrative.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.classification == GroupClassification::Admin
    }

    /// Orders groups by name, then by prefix.
    #[must_use]
    pub fn cmp_by_name(&self, other: &Self) -> Ordering {
        self.name()
            .cmp(other.name())
            .then_with(|| self.prefix().cmp(other.prefix()))
    }
}

/// Reduced group projection for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Group common name.
    pub name: String,
    /// Group description.
    pub description: String,
    /// Sorted member references.
    pub members: Vec<String>,
}

impl From<&Group> for GroupInfo {
    fn from(group: &Group) -> Self {
        let mut members = group.member_ids.clone();
        members.sort();
        Self {
            name: group.cn.clone(),
            description: group.description.clone(),
            members,
        }
    }
}
