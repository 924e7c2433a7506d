//! Group management commands.

use serde::Serialize;
use tabled::Tabled;

use sd_ldap::{Directory, DirectoryService};
use sd_model::{Group, User};

use crate::cli::GroupCommand;
use crate::config::OutputFormat;
use crate::output::{output, output_single, success, warning};
use crate::CliError;

use super::user::UserRow;

/// Group representation for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct GroupRow {
    /// Group name.
    #[tabled(rename = "CN")]
    pub cn: String,
    /// Schema family.
    #[tabled(rename = "Type")]
    pub group_type: String,
    /// Naming-convention class.
    #[tabled(rename = "Class")]
    pub classification: String,
    /// Number of members.
    #[tabled(rename = "Members")]
    pub members: usize,
    /// Description.
    #[tabled(rename = "Description")]
    pub description: String,
}

impl From<&Group> for GroupRow {
    fn from(group: &Group) -> Self {
        Self {
            cn: group.cn.clone(),
            group_type: group.group_type.to_string(),
            classification: format!("{:?}", group.classification).to_lowercase(),
            members: group.member_ids.len(),
            description: group.description.clone(),
        }
    }
}

async fn require_group(
    service: &DirectoryService,
    conn: &mut dyn Directory,
    cn: &str,
) -> crate::CliResult<Group> {
    service
        .get_group_by_cn(conn, cn)
        .await?
        .ok_or_else(|| CliError::group_not_found(cn))
}

async fn require_user(
    service: &DirectoryService,
    conn: &mut dyn Directory,
    uid: &str,
) -> crate::CliResult<User> {
    service
        .get_user_by_uid(conn, uid)
        .await?
        .ok_or_else(|| CliError::user_not_found(uid))
}

/// Runs a group command.
pub async fn run_group(
    cmd: GroupCommand,
    service: &DirectoryService,
    conn: &mut dyn Directory,
    output_format: OutputFormat,
) -> crate::CliResult<()> {
    match cmd {
        GroupCommand::List => {
            let groups = service.get_groups(conn).await?;
            let rows: Vec<GroupRow> = groups.iter().map(GroupRow::from).collect();
            output(&rows, output_format)?;
        }

        GroupCommand::Show { cn } => {
            let group = require_group(service, conn, &cn).await?;
            output_single(&group, output_format)?;
        }

        GroupCommand::Members { cn } => {
            let group = require_group(service, conn, &cn).await?;
            let members = service.get_group_members(conn, &group).await?;
            let unknown = members.iter().filter(|m| m.is_unknown()).count();
            if unknown > 0 && output_format == OutputFormat::Table {
                warning(&format!("{unknown} member(s) without a directory entry"));
            }
            let rows: Vec<UserRow> = members.iter().map(UserRow::from).collect();
            output(&rows, output_format)?;
        }

        GroupCommand::Admins { cn } => {
            let group = require_group(service, conn, &cn).await?;
            let admins = service.get_group_admins(conn, &group).await?;
            let rows: Vec<UserRow> = admins.iter().map(UserRow::from).collect();
            output(&rows, output_format)?;
        }

        GroupCommand::AddMember { cn, uid } => {
            let user = require_user(service, conn, &uid).await?;
            service
                .add_user_to_group(conn, &user, &cn)
                .await?
                .ok_or_else(|| CliError::group_not_found(&cn))?;
            success(&format!("User '{uid}' is a member of '{cn}'"));
        }

        GroupCommand::RemoveMember { cn, uid } => {
            let user = require_user(service, conn, &uid).await?;
            service
                .remove_user_from_group(conn, &user, &cn)
                .await?
                .ok_or_else(|| CliError::group_not_found(&cn))?;
            success(&format!("User '{uid}' is not a member of '{cn}'"));
        }
    }

    Ok(())
}
