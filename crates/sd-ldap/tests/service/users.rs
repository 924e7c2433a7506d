//! User creation and update integration tests.

use sd_core::AccountError;
use sd_ldap::memory::WriteOp;
use sd_ldap::Modification;
use uuid::Uuid;

use crate::common::{new_user, person, TestEnv};

/// Tests that a created user carries every derived default.
#[tokio::test]
async fn test_insert_applies_defaults() -> anyhow::Result<()> {
    let mut env = TestEnv::new();

    let created = env
        .service
        .insert(&mut env.dir, new_user("Viktor", "Gruber", "acme"))
        .await?;

    assert_eq!(created.uid, "vikgru");
    assert_eq!(created.dn, "uid=vikgru,ou=users,ou=acme,dc=example,dc=org");
    assert_eq!(created.uid_number, Some(1003));
    assert_eq!(created.mail, "viktor.gruber@example.org");
    assert_eq!(created.home_directory, "/home/vikgru");
    assert_eq!(created.samba_sid, "S-1-5-21-7-3006");
    assert_eq!(created.display_name, "Viktor Gruber (acme)");
    assert_eq!(created.cn, "Viktor Gruber");
    assert_eq!(created.gecos, "Viktor Gruber");
    assert_eq!(created.organization, "ACME Corp");
    assert_eq!(created.samba_password_history, "0".repeat(64));
    assert!(Uuid::parse_str(&created.employee_number).is_ok());

    let entry = env.dir.entry(&created.dn).expect("entry written");
    let password = entry.get_attr("userPassword").expect("password set");
    assert!(password.starts_with("{CRYPT}$6$"));
    assert_eq!(entry.get_attr("sambaNTPassword").map(str::len), Some(32));

    let writes = env.dir.writes();
    assert!(matches!(&writes[0], WriteOp::Add { dn } if *dn == created.dn));
    Ok(())
}

/// Tests that gecos is folded to ASCII.
#[tokio::test]
async fn test_insert_folds_gecos() -> anyhow::Result<()> {
    let mut env = TestEnv::new();

    let created = env
        .service
        .insert(&mut env.dir, new_user("Jürgen", "Großmann", "beta"))
        .await?;

    assert_eq!(created.cn, "Jürgen Großmann");
    assert_eq!(created.gecos, "Juergen Grossmann");
    assert_eq!(created.mail, "juergen.grossmann@example.org");
    assert_eq!(created.display_name, "Jürgen Großmann (beta)");
    Ok(())
}

/// Tests that a name whose only candidate is taken exhausts the suggestions.
#[tokio::test]
async fn test_insert_username_exhaustion() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    env.dir.insert(person("aaaaaa", "Aaa", "Aaab", 1500, "acme"));
    env.dir.clear_log();

    let err = env
        .service
        .insert(&mut env.dir, new_user("Aaa", "Aaaa", "acme"))
        .await
        .unwrap_err();

    assert!(matches!(err, AccountError::AllocationExhausted(_)));
    assert_eq!(err.code(), "user.create.usernames.exceeded");
    assert!(env.dir.writes().is_empty());
    Ok(())
}

/// Tests that a realistic name runs out of suggestions once all eight are
/// taken, while an explicit free uid still works.
#[tokio::test]
async fn test_insert_all_suggestions_taken() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let candidates = sd_ldap::suggest::suggestions("Viktor", "Gruber")?;
    assert_eq!(candidates.len(), 8);
    for (i, candidate) in (0u32..).zip(&candidates) {
        env.dir.insert(person(candidate, "Seed", candidate, 1600 + i, "acme"));
    }
    env.dir.clear_log();

    let err = env
        .service
        .insert(&mut env.dir, new_user("Viktor", "Gruber", "acme"))
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::AllocationExhausted(_)));
    assert_eq!(err.code(), "user.create.usernames.exceeded");
    assert!(env.dir.writes().is_empty());

    let user = new_user("Viktor", "Gruber", "acme").with_uid("vgruber");
    let created = env.service.insert(&mut env.dir, user).await?;
    assert_eq!(created.uid, "vgruber");
    assert_eq!(created.mail, "viktor.gruber@example.org");
    Ok(())
}

/// Tests that an explicitly requested uid must be free.
#[tokio::test]
async fn test_insert_explicit_uid_taken() -> anyhow::Result<()> {
    let mut env = TestEnv::new();

    let user = new_user("Jane", "Doerfler", "acme").with_uid("doejan");
    let err = env.service.insert(&mut env.dir, user).await.unwrap_err();

    assert!(matches!(err, AccountError::Uniqueness(_)));
    assert_eq!(err.code(), "user.create.username.alreadyUsed");
    assert_eq!(err.args(), ["doejan"]);
    Ok(())
}

/// Tests that the mail local part must be unique.
#[tokio::test]
async fn test_insert_mail_prefix_taken() -> anyhow::Result<()> {
    let mut env = TestEnv::new();

    let user = new_user("Jane", "Doe", "beta").with_uid("janedoe");
    let err = env.service.insert(&mut env.dir, user).await.unwrap_err();

    assert_eq!(err.code(), "user.mail.alreadyUsed");
    assert_eq!(err.args(), ["jane.doe"]);
    Ok(())
}

/// Tests that a rejected add surfaces the directory diagnostics.
#[tokio::test]
async fn test_insert_rejected_by_directory() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    env.dir.fail_on("add", 19, "constraint violation");

    let err = env
        .service
        .insert(&mut env.dir, new_user("Viktor", "Gruber", "acme"))
        .await
        .unwrap_err();

    assert!(matches!(err, AccountError::DirectoryProtocol(_)));
    assert_eq!(err.code(), "user.create.failed");
    assert_eq!(err.args()[0], "constraint violation");
    assert_eq!(err.args()[2], "19");
    Ok(())
}

/// Tests that updating with the stored record writes nothing.
#[tokio::test]
async fn test_update_without_changes_is_idempotent() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let user = env.user("doejan").await?;
    env.dir.clear_log();

    let updated = env.service.update(&mut env.dir, user.clone()).await?;

    assert_eq!(updated, user);
    assert!(env.dir.writes().is_empty());
    Ok(())
}

/// Tests that derived attributes are never written by an update.
#[tokio::test]
async fn test_update_ignores_derived_attributes() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let mut user = env.user("doejan").await?;
    user.mail = "someone.else@example.org".to_string();
    user.display_name = "Someone Else".to_string();
    user.home_directory = "/tmp".to_string();
    user.samba_sid = "S-0".to_string();
    user.uid_number = Some(4242);
    env.dir.clear_log();

    env.service.update(&mut env.dir, user).await?;

    assert!(env.dir.writes().is_empty());
    Ok(())
}

/// Tests that only changed attributes are written, and blanks delete.
#[tokio::test]
async fn test_update_writes_minimal_change_set() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let mut user = env.user("doejan").await?;
    user.title = "Lead Engineer".to_string();
    env.dir.clear_log();

    let updated = env.service.update(&mut env.dir, user).await?;
    assert_eq!(updated.title, "Lead Engineer");

    let writes = env.dir.writes();
    assert_eq!(writes.len(), 1);
    let WriteOp::Modify { mods, .. } = &writes[0] else {
        panic!("expected modify, got {writes:?}");
    };
    assert_eq!(
        mods,
        &[Modification::Replace("title".into(), vec!["Lead Engineer".into()])]
    );

    let mut user = updated;
    user.title = String::new();
    env.dir.clear_log();
    env.service.update(&mut env.dir, user).await?;
    let writes = env.dir.writes();
    let WriteOp::Modify { mods, .. } = &writes[0] else {
        panic!("expected modify, got {writes:?}");
    };
    assert_eq!(mods, &[Modification::Delete("title".into(), vec![])]);
    Ok(())
}

/// Tests that a company change moves the entry to the other subtree.
#[tokio::test]
async fn test_update_company_change_moves_entry() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let mut user = env.user("doejan").await?;
    user.company_key = "beta".to_string();
    env.dir.clear_log();

    let moved = env.service.update(&mut env.dir, user).await?;

    assert_eq!(moved.dn, "uid=doejan,ou=users,ou=beta,dc=example,dc=org");
    assert_eq!(moved.company_key, "beta");
    assert_eq!(moved.organization, "Beta Ltd");
    assert!(env.dir.entry("uid=doejan,ou=users,ou=acme,dc=example,dc=org").is_none());

    let writes = env.dir.writes();
    assert!(matches!(
        writes.last(),
        Some(WriteOp::ModifyDn { new_dn, .. }) if new_dn.contains("ou=beta")
    ));
    Ok(())
}

/// Tests that a change of employment type moves default group membership.
#[tokio::test]
async fn test_update_employment_type_moves_default_groups() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let mut user = env.user("doejan").await?;
    user.employee_type = "Contractor".to_string();

    env.service.update(&mut env.dir, user).await?;

    let svc = env.service.clone();
    let staff = svc.get_group_by_cn(&mut env.dir, "staff").await?.expect("staff");
    let externals = svc
        .get_group_by_cn(&mut env.dir, "externals")
        .await?
        .expect("externals");
    let team = svc
        .get_group_by_cn(&mut env.dir, "team-web")
        .await?
        .expect("team-web");
    assert!(!staff.member_ids.contains(&"doejan".to_string()));
    assert!(externals.member_ids.contains(&"doejan".to_string()));
    assert!(team.member_ids.contains(&"doejan".to_string()));
    Ok(())
}

/// Tests employee number handling on update.
#[tokio::test]
async fn test_update_employee_number() -> anyhow::Result<()> {
    let mut env = TestEnv::new();

    let mut user = env.user("doejan").await?;
    user.employee_number = "EMP-1002".to_string();
    let err = env.service.update(&mut env.dir, user).await.unwrap_err();
    assert_eq!(err.code(), "user.modify.employeeNumber.alreadyUsed");

    let mut user = env.user("doejan").await?;
    user.employee_number = String::new();
    let updated = env.service.update(&mut env.dir, user).await?;
    assert!(Uuid::parse_str(&updated.employee_number).is_ok());
    Ok(())
}

/// Tests that updating an unknown user fails.
#[tokio::test]
async fn test_update_unknown_user() -> anyhow::Result<()> {
    let mut env = TestEnv::new();

    let user = new_user("No", "Body", "acme").with_uid("nobody");
    let err = env.service.update(&mut env.dir, user).await.unwrap_err();

    assert!(matches!(err, AccountError::NotFound(_)));
    assert_eq!(err.code(), "user.notExists");
    Ok(())
}

/// Tests that a failed modify is reported with the update code.
#[tokio::test]
async fn test_update_rejected_by_directory() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let mut user = env.user("doejan").await?;
    user.title = "Lead".to_string();
    env.dir.fail_on("modify", 50, "insufficient access");

    let err = env.service.update(&mut env.dir, user).await.unwrap_err();

    assert_eq!(err.code(), "user.modify.failed");
    assert_eq!(err.args()[2], "50");
    Ok(())
}
