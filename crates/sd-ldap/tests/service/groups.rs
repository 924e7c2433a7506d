//! Group membership and authorization integration tests.

use sd_model::UserState;

use crate::common::{dn_group, TestEnv, GROUPS};

/// Tests that posixGroup members are stored by uid.
#[tokio::test]
async fn test_add_member_to_posix_group_uses_uid() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let user = env.user("roejon").await?;

    let group = env
        .service
        .add_user_to_group(&mut env.dir, &user, "team-web")
        .await?
        .expect("group exists");

    assert!(group.member_ids.contains(&"roejon".to_string()));
    let entry = env.dir.entry(&format!("cn=team-web,{GROUPS}")).expect("entry");
    assert!(entry.get_attrs("memberUid").expect("members").contains(&"roejon".to_string()));
    Ok(())
}

/// Tests that groupOfNames members are stored by DN.
#[tokio::test]
async fn test_add_member_to_dn_group_uses_dn() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let user = env.user("doejan").await?;

    let group = env
        .service
        .add_user_to_group(&mut env.dir, &user, "wiki-editors")
        .await?
        .expect("group exists");

    assert_eq!(group.member_ids, [user.dn.clone()]);
    assert!(group.has_member(&user.uid, &user.dn));
    Ok(())
}

/// Tests that repeated adds and removes of the same membership write once.
#[tokio::test]
async fn test_membership_changes_are_idempotent() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let user = env.user("doejan").await?;
    env.dir.clear_log();

    let group = env
        .service
        .add_user_to_group(&mut env.dir, &user, "team-web")
        .await?
        .expect("group exists");
    assert!(group.member_ids.contains(&"doejan".to_string()));
    assert!(env.dir.writes().is_empty());

    env.service
        .remove_user_from_group(&mut env.dir, &user, "team-db")
        .await?;
    assert!(env.dir.writes().is_empty());

    env.service
        .remove_user_from_group(&mut env.dir, &user, "team-web")
        .await?;
    env.service
        .remove_user_from_group(&mut env.dir, &user, "team-web")
        .await?;
    assert_eq!(env.dir.writes().len(), 1);
    Ok(())
}

/// Tests that membership changes on a missing group report nothing.
#[tokio::test]
async fn test_membership_change_on_missing_group() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let user = env.user("doejan").await?;

    let group = env
        .service
        .add_user_to_group(&mut env.dir, &user, "no-such-group")
        .await?;

    assert!(group.is_none());
    assert!(env.dir.writes().is_empty());
    Ok(())
}

/// Tests that cached member listings reflect a committed membership change.
#[tokio::test]
async fn test_member_listing_sees_new_member() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let svc = env.service.clone();

    let group = svc.get_group_by_cn(&mut env.dir, "team-web").await?.expect("group");
    let before = svc.get_group_members(&mut env.dir, &group).await?;
    assert_eq!(before.len(), 1);

    let user = env.user("roejon").await?;
    svc.add_user_to_group(&mut env.dir, &user, "team-web").await?;

    let group = svc.get_group_by_cn(&mut env.dir, "team-web").await?.expect("group");
    let after = svc.get_group_members(&mut env.dir, &group).await?;
    let uids: Vec<_> = after.iter().map(|m| m.uid.as_str()).collect();
    assert_eq!(uids, ["doejan", "roejon"]);
    Ok(())
}

/// Tests that cached member details follow lifecycle changes and updates.
#[tokio::test]
async fn test_member_listing_follows_user_changes() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let svc = env.service.clone();
    let group = svc.get_group_by_cn(&mut env.dir, "team-web").await?.expect("group");

    let before = svc.get_group_members(&mut env.dir, &group).await?;
    assert_eq!(before[0].status, UserState::Active);

    assert!(svc.deactivate(&mut env.dir, "doejan").await?);
    let after = svc.get_group_members(&mut env.dir, &group).await?;
    assert_eq!(after[0].uid, "doejan");
    assert_eq!(after[0].status, UserState::Inactive);

    assert!(svc.activate(&mut env.dir, "doejan").await?);
    let after = svc.get_group_members(&mut env.dir, &group).await?;
    assert_eq!(after[0].status, UserState::Active);

    let mut user = env.user("doejan").await?;
    user.company_key = "beta".to_string();
    svc.update(&mut env.dir, user).await?;
    let after = svc.get_group_members(&mut env.dir, &group).await?;
    assert_eq!(after[0].organization, "Beta Ltd");
    assert_eq!(after[0].dn, "uid=doejan,ou=users,ou=beta,dc=example,dc=org");
    Ok(())
}

/// Tests the three tiers of admin group resolution.
#[tokio::test]
async fn test_admin_group_resolution() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let svc = env.service.clone();

    let admin = svc.get_group_by_cn(&mut env.dir, "adm-web").await?.expect("group");
    let resolved = svc.get_admin_group(&mut env.dir, &admin).await?.expect("admin");
    assert_eq!(resolved.cn, "adm-web");

    let team = svc.get_group_by_cn(&mut env.dir, "team-web").await?.expect("group");
    let resolved = svc.get_admin_group(&mut env.dir, &team).await?.expect("admin");
    assert_eq!(resolved.cn, "adm-web");

    let orphan = svc.get_group_by_cn(&mut env.dir, "team-db").await?.expect("group");
    let resolved = svc.get_admin_group(&mut env.dir, &orphan).await?.expect("admin");
    assert_eq!(resolved.cn, "ldap-admins");

    let staff = svc.get_group_by_cn(&mut env.dir, "staff").await?.expect("group");
    let resolved = svc.get_admin_group(&mut env.dir, &staff).await?.expect("admin");
    assert_eq!(resolved.cn, "ldap-admins");

    let admins = svc.get_group_admins(&mut env.dir, &team).await?;
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].uid, "roejon");
    Ok(())
}

/// Tests permission checks derived from group membership.
#[tokio::test]
async fn test_group_admin_permissions() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let svc = env.service.clone();

    assert!(svc.is_group_admin(&mut env.dir, "roejon", "team-web").await?);
    assert!(!svc.is_group_admin(&mut env.dir, "doejan", "team-web").await?);
    assert!(svc.is_group_admin(&mut env.dir, "roejon", "adm-web").await?);
    assert!(!svc.is_group_admin(&mut env.dir, "roejon", "staff").await?);

    assert!(svc.is_admin(&mut env.dir, "roejon").await?);
    assert!(!svc.is_admin(&mut env.dir, "doejan").await?);
    assert!(!svc.is_user_administrator(&mut env.dir, "roejon").await?);
    Ok(())
}

/// Tests that groups of a user are found by uid and DN membership.
#[tokio::test]
async fn test_groups_by_user_cover_both_member_kinds() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let user = env.user("doejan").await?;
    env.dir.insert(dn_group("wiki-admins", &[user.dn.as_str()]));

    let groups = env
        .service
        .get_groups_by_user(&mut env.dir, &user.uid, &user.dn)
        .await?;

    let names: Vec<_> = groups.iter().map(|g| g.cn.as_str()).collect();
    assert_eq!(names, ["wiki-admins", "staff", "team-web"]);
    Ok(())
}
