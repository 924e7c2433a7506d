//! Group classification by naming convention.

use sd_model::{GroupClassification, PREFIX_SEPARATOR};

use crate::config::{GroupPrefixes, Permissions};

/// Substrings that mark a group as administrative.
const ADMIN_MARKERS: [&str; 2] = ["admins", "administrators"];

/// Derives group classifications from configured prefixes.
#[derive(Debug, Clone)]
pub struct GroupClassifier {
    prefixes: GroupPrefixes,
    admin_group: String,
}

fn starts_with_prefix(cn: &str, prefix: &str) -> bool {
    !prefix.is_empty() && cn.starts_with(prefix)
}

impl GroupClassifier {
    /// Creates a classifier.
    #[must_use]
    pub fn new(prefixes: GroupPrefixes, permissions: &Permissions) -> Self {
        Self {
            prefixes,
            admin_group: permissions.admin_group.clone(),
        }
    }

    /// Classifies a group name. Administrative markers win over the other
    /// prefixes; technical wins over team.
    #[must_use]
    pub fn classify(&self, cn: &str) -> GroupClassification {
        if self.is_admin(cn) {
            GroupClassification::Admin
        } else if starts_with_prefix(cn, &self.prefixes.technical) {
            GroupClassification::Technical
        } else if starts_with_prefix(cn, &self.prefixes.team) {
            GroupClassification::Team
        } else {
            GroupClassification::Unknown
        }
    }

    fn is_admin(&self, cn: &str) -> bool {
        ADMIN_MARKERS.iter().any(|marker| cn.contains(marker))
            || cn == self.admin_group
            || starts_with_prefix(cn, &self.prefixes.admin)
    }

    /// Returns the admin counterpart of a team group name, replacing only the
    /// leading team prefix. `None` if the name has no team prefix.
    #[must_use]
    pub fn admin_counterpart(&self, cn: &str) -> Option<String> {
        if self.prefixes.team.is_empty() {
            return None;
        }
        cn.strip_prefix(self.prefixes.team.as_str())
            .map(|rest| format!("{}{rest}", self.prefixes.admin))
    }

    /// Returns the global admin group name.
    #[must_use]
    pub fn admin_group(&self) -> &str {
        &self.admin_group
    }

    /// Returns which group a user must belong to in order to administer
    /// `cn`: the group itself for admin and technical groups, the admin
    /// counterpart for team groups, none otherwise.
    #[must_use]
    pub fn required_membership(&self, cn: &str) -> Option<String> {
        let admin = self.separated(&self.prefixes.admin);
        let technical = self.separated(&self.prefixes.technical);
        let team = self.separated(&self.prefixes.team);

        if admin.as_deref().is_some_and(|p| cn.starts_with(p))
            || technical.as_deref().is_some_and(|p| cn.starts_with(p))
        {
            return Some(cn.to_string());
        }
        match (team, admin) {
            (Some(team), Some(admin)) => cn
                .strip_prefix(team.as_str())
                .map(|rest| format!("{admin}{rest}")),
            _ => None,
        }
    }

    fn separated(&self, prefix: &str) -> Option<String> {
        (!prefix.is_empty()).then(|| format!("{prefix}{PREFIX_SEPARATOR}"))
    }
}
