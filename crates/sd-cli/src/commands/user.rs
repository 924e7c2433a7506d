//! User management commands.

use serde::Serialize;
use tabled::Tabled;

use sd_ldap::{Directory, DirectoryService, UserListing, UserQuery};
use sd_model::{User, UserInfo};

use crate::cli::UserCommand;
use crate::config::OutputFormat;
use crate::output::{confirm, output, output_single, output_values, success, warning};
use crate::CliError;

use super::group::GroupRow;

/// User representation for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct UserRow {
    /// Login name.
    #[tabled(rename = "UID")]
    pub uid: String,
    /// Full name.
    #[tabled(rename = "Name")]
    pub name: String,
    /// Mail address.
    #[tabled(rename = "Mail")]
    pub mail: String,
    /// Company display name.
    #[tabled(rename = "Organization")]
    pub organization: String,
    /// Employment type.
    #[tabled(rename = "Type")]
    pub employee_type: String,
    /// Account state.
    #[tabled(rename = "Status")]
    pub status: String,
}

impl From<&UserInfo> for UserRow {
    fn from(info: &UserInfo) -> Self {
        Self {
            uid: info.uid.clone(),
            name: format!("{} {}", info.given_name, info.sn),
            mail: info.mail.clone(),
            organization: info.organization.clone(),
            employee_type: info.employee_type.clone(),
            status: info.status.to_string(),
        }
    }
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        Self::from(&UserInfo::from(user))
    }
}

/// Runs a user command.
pub async fn run_user(
    cmd: UserCommand,
    service: &DirectoryService,
    conn: &mut dyn Directory,
    output_format: OutputFormat,
) -> crate::CliResult<()> {
    match cmd {
        UserCommand::Show { uid } => {
            let user = service
                .get_user_by_uid(conn, &uid)
                .await?
                .ok_or_else(|| CliError::user_not_found(&uid))?;
            output_single(&user, output_format)?;
        }

        UserCommand::Search {
            term,
            company,
            state,
            employee_type,
        } => {
            let mut query = UserQuery::new();
            if let Some(term) = term {
                query = query.search_term(term);
            }
            if let Some(company) = company {
                query = query.company(company);
            }
            if let Some(state) = state {
                query = query.state(state.into());
            }
            if let Some(employee_type) = employee_type {
                query = query.employee_type(employee_type);
            }

            let rows: Vec<UserRow> = match service.find_users(conn, &query).await? {
                UserListing::Info(infos) => infos.iter().map(UserRow::from).collect(),
                UserListing::Full(users) => users.iter().map(UserRow::from).collect(),
            };
            output(&rows, output_format)?;
        }

        UserCommand::Suggest { given_name, sn } => {
            let free = service.available_uids(conn, &given_name, &sn).await?;
            if free.is_empty() && output_format == OutputFormat::Table {
                warning("every suggestion for this name is taken");
            }
            output_values(&free, output_format)?;
        }

        UserCommand::Activate { uid } => {
            if !service.activate(conn, &uid).await? {
                return Err(CliError::user_not_found(uid));
            }
            success(&format!("User '{uid}' activated"));
        }

        UserCommand::Deactivate { uid, force } => {
            if !force && !confirm(&format!("Deactivate user '{uid}'?"))? {
                return Err(CliError::Cancelled);
            }
            if !service.deactivate(conn, &uid).await? {
                return Err(CliError::user_not_found(uid));
            }
            success(&format!("User '{uid}' deactivated"));
        }

        UserCommand::ResetPassword { uid, force } => {
            if !force && !confirm(&format!("Reset the password of '{uid}'?"))? {
                return Err(CliError::Cancelled);
            }
            let password = service.reset_password(conn, &uid).await?;
            success(&format!("Password of '{uid}' reset"));
            println!("{password}");
        }

        UserCommand::Groups { uid } => {
            let user = service
                .get_user_by_uid(conn, &uid)
                .await?
                .ok_or_else(|| CliError::user_not_found(&uid))?;
            let groups = service.get_groups_by_user(conn, &user.uid, &user.dn).await?;
            let rows: Vec<GroupRow> = groups.iter().map(GroupRow::from).collect();
            output(&rows, output_format)?;
        }
    }

    Ok(())
}
