//! Directory queries.
//!
//! Every filter the engine sends is built here, so the query shapes are in
//! one place and values are always escaped by [`Filter`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use sd_model::{GroupType, UserState};

use crate::codec;
use crate::filter::Filter;
use crate::mapper::attr;

/// Attributes fetched for the reduced user projection.
pub const INFO_ATTRIBUTES: &[&str] = &[
    attr::UID,
    attr::UID_NUMBER,
    attr::GIVEN_NAME,
    attr::SN,
    attr::MAIL,
    attr::STATUS,
    attr::DESCRIPTION,
    attr::EXTERNAL_ACCOUNTS,
];

fn posix_account() -> Filter {
    Filter::object_class("posixAccount")
}

fn any_group() -> Filter {
    Filter::or(GroupType::ALL.map(|t| Filter::object_class(t.object_class())))
}

/// Every user entry.
#[must_use]
pub fn all_users() -> Filter {
    Filter::and([Filter::object_class("inetOrgPerson"), posix_account()])
}

/// The user with a login name.
#[must_use]
pub fn user_by_uid(uid: &str) -> Filter {
    Filter::and([posix_account(), Filter::equals(attr::UID, uid)])
}

/// The user with a numeric id.
#[must_use]
pub fn user_by_uid_number(uid_number: u32) -> Filter {
    Filter::and([
        posix_account(),
        Filter::equals(attr::UID_NUMBER, uid_number.to_string()),
    ])
}

/// Substring match of a term over the name-like attributes.
#[must_use]
pub fn search_term(term: &str) -> Filter {
    Filter::or(
        [attr::UID, attr::GIVEN_NAME, attr::SN, attr::MAIL, attr::CN]
            .map(|name| Filter::contains(name, term)),
    )
}

/// Users matching a free-text term.
#[must_use]
pub fn users_by_search_term(term: &str) -> Filter {
    Filter::and([posix_account(), search_term(term)])
}

/// Users whose `attribute` equals `value`.
#[must_use]
pub fn attribute_used(attribute: &str, value: &str) -> Filter {
    Filter::and([posix_account(), Filter::equals(attribute, value)])
}

/// Users whose mail starts with `<prefix>@`.
#[must_use]
pub fn mail_prefix_used(prefix: &str) -> Filter {
    Filter::and([
        posix_account(),
        Filter::starts_with(attr::MAIL, format!("{prefix}@")),
    ])
}

/// Every supported group.
#[must_use]
pub fn all_groups() -> Filter {
    any_group()
}

/// The group with a common name.
#[must_use]
pub fn group_by_cn(cn: &str) -> Filter {
    Filter::and([any_group(), Filter::equals(attr::CN, cn)])
}

/// Groups listing a user, by uid for Posix groups and by DN otherwise.
#[must_use]
pub fn groups_by_user(uid: &str, dn: &str) -> Filter {
    Filter::or(GroupType::ALL.map(|t| {
        let value = if t.members_are_dns() { dn } else { uid };
        Filter::and([
            Filter::object_class(t.object_class()),
            Filter::equals(t.member_attribute(), value),
        ])
    }))
}

// ============================================================================
// User Queries
// ============================================================================

/// Inclusive date window over an ISO date attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day in the window.
    pub from: NaiveDate,
    /// Last day in the window.
    pub to: NaiveDate,
}

impl DateRange {
    /// Lower bound of an open window.
    #[must_use]
    pub fn min() -> NaiveDate {
        NaiveDate::from_ymd_opt(0, 1, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Upper bound of an open window.
    #[must_use]
    pub fn max() -> NaiveDate {
        NaiveDate::from_ymd_opt(9999, 12, 12).unwrap_or(NaiveDate::MAX)
    }

    /// Builds a window from optional bounds; `None` when both are open.
    #[must_use]
    pub fn of(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Option<Self> {
        if from.is_none() && to.is_none() {
            return None;
        }
        Some(Self {
            from: from.unwrap_or_else(Self::min),
            to: to.unwrap_or_else(Self::max),
        })
    }

    /// Renders the window as a `>=`/`<=` pair over `attribute`.
    #[must_use]
    pub fn filter(&self, attribute: &str) -> Filter {
        Filter::and([
            Filter::ge(attribute, codec::format_date(self.from)),
            Filter::le(attribute, codec::format_date(self.to)),
        ])
    }
}

/// Amount of data returned for each user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    /// Reduced projection.
    #[default]
    Info,
    /// Every attribute.
    Full,
}

impl Projection {
    /// Returns the attributes to request.
    #[must_use]
    pub const fn attributes(self) -> &'static [&'static str] {
        match self {
            Self::Info => INFO_ATTRIBUTES,
            Self::Full => crate::directory::ALL_ATTRIBUTES,
        }
    }
}

/// Structured user query. Unset criteria do not restrict the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuery {
    /// Exact login name.
    pub uid: Option<String>,
    /// Account state.
    pub state: Option<UserState>,
    /// Company key; restricts the search base to the company subtree.
    pub company: Option<String>,
    /// Employment type.
    pub employee_type: Option<String>,
    /// Free-text term.
    pub search_term: Option<String>,
    /// Entry date window.
    pub entry_date: Option<DateRange>,
    /// Exit date window.
    pub exit_date: Option<DateRange>,
    /// Projection.
    #[serde(default)]
    pub projection: Projection,
}

impl UserQuery {
    /// Creates an unrestricted query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to a login name.
    #[must_use]
    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Restricts to an account state.
    #[must_use]
    pub const fn state(mut self, state: UserState) -> Self {
        self.state = Some(state);
        self
    }

    /// Restricts to a company subtree.
    #[must_use]
    pub fn company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    /// Restricts to an employment type.
    #[must_use]
    pub fn employee_type(mut self, employee_type: impl Into<String>) -> Self {
        self.employee_type = Some(employee_type.into());
        self
    }

    /// Restricts to a free-text term.
    #[must_use]
    pub fn search_term(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    /// Restricts the entry date.
    #[must_use]
    pub const fn entry_date(mut self, range: DateRange) -> Self {
        self.entry_date = Some(range);
        self
    }

    /// Restricts the exit date.
    #[must_use]
    pub const fn exit_date(mut self, range: DateRange) -> Self {
        self.exit_date = Some(range);
        self
    }

    /// Selects the projection.
    #[must_use]
    pub const fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Renders the query filter.
    #[must_use]
    pub fn filter(&self) -> Filter {
        let mut terms = vec![posix_account()];
        if let Some(uid) = &self.uid {
            terms.push(Filter::equals(attr::UID, uid.as_str()));
        }
        if let Some(state) = self.state {
            terms.push(Filter::equals(attr::STATUS, state.as_str()));
        }
        if let Some(employee_type) = &self.employee_type {
            terms.push(Filter::equals(attr::DESCRIPTION, employee_type.as_str()));
        }
        if let Some(term) = &self.search_term {
            terms.push(search_term(term));
        }
        if let Some(range) = &self.entry_date {
            terms.push(range.filter(attr::ENTRY_DATE));
        }
        if let Some(range) = &self.exit_date {
            terms.push(range.filter(attr::EXIT_DATE));
        }
        Filter::and(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fixed_queries() {
        assert_eq!(
            user_by_uid("doejan").render(),
            "(&(objectClass=posixAccount)(uid=doejan))"
        );
        assert_eq!(
            all_users().render(),
            "(&(objectClass=inetOrgPerson)(objectClass=posixAccount))"
        );
        assert_eq!(
            group_by_cn("team-web").render(),
            "(&(|(objectClass=posixGroup)(objectClass=groupOfUniqueNames)(objectClass=groupOfNames))(cn=team-web))"
        );
        assert_eq!(
            mail_prefix_used("jane.doe").render(),
            "(&(objectClass=posixAccount)(mail=jane.doe@*))"
        );
    }

    #[test]
    fn groups_by_user_uses_member_form_per_type() {
        assert_eq!(
            groups_by_user("doejan", "uid=doejan,dc=example").render(),
            "(|(&(objectClass=posixGroup)(memberUid=doejan))\
             (&(objectClass=groupOfUniqueNames)(uniqueMember=uid=doejan,dc=example))\
             (&(objectClass=groupOfNames)(member=uid=doejan,dc=example)))"
        );
    }

    #[test]
    fn search_term_is_escaped() {
        assert_eq!(
            users_by_search_term("a*b").render(),
            "(&(objectClass=posixAccount)(|(uid=*a\\2ab*)(givenName=*a\\2ab*)(sn=*a\\2ab*)(mail=*a\\2ab*)(cn=*a\\2ab*)))"
        );
    }

    #[test]
    fn open_date_range_uses_sentinels() {
        assert_eq!(DateRange::of(None, None), None);

        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let range = DateRange::of(Some(from), None).unwrap();
        assert_eq!(
            range.filter("szzExitDate").render(),
            "(&(szzExitDate>=2024-01-01)(szzExitDate<=9999-12-12))"
        );
        assert_eq!(codec::format_date(DateRange::min()), "0000-01-01");
    }

    #[test]
    fn user_query_combines_criteria() {
        let query = UserQuery::new()
            .state(UserState::Active)
            .employee_type("Employee")
            .projection(Projection::Full);
        assert_eq!(
            query.filter().render(),
            "(&(objectClass=posixAccount)(szzStatus=active)(description=Employee))"
        );
        assert_eq!(UserQuery::new().filter().render(), "(&(objectClass=posixAccount))");
    }
}
