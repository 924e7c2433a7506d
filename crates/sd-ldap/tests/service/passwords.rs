//! Password and authentication integration tests.

use sd_auth::PasswordChange;
use sd_core::AccountError;

use crate::common::TestEnv;

const STRONG: &str = "Tq7!vRm#2pLx9wZs";

fn change<'a>(old: &'a str, new: &'a str, repeat: &'a str) -> PasswordChange<'a> {
    PasswordChange {
        old_password: old,
        new_password: new,
        new_password_repeat: repeat,
    }
}

/// Tests that an unchanged password is rejected without any write.
#[tokio::test]
async fn test_unchanged_password_writes_nothing() -> anyhow::Result<()> {
    let mut env = TestEnv::new();

    let request = change("initial-secret", "initial-secret", "initial-secret");
    let err = env
        .service
        .change_password(&mut env.dir, "doejan", &request)
        .await
        .unwrap_err();

    assert!(matches!(err, AccountError::Validation(_)));
    assert_eq!(err.code(), "password.unchanged");
    assert!(env.dir.writes().is_empty());
    Ok(())
}

/// Tests that a mistyped repeat is rejected first.
#[tokio::test]
async fn test_repeat_mismatch() -> anyhow::Result<()> {
    let mut env = TestEnv::new();

    let request = change("initial-secret", STRONG, "something else");
    let err = env
        .service
        .change_password(&mut env.dir, "doejan", &request)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "password.repeat.mismatch");
    assert!(env.dir.writes().is_empty());
    Ok(())
}

/// Tests that breached passwords are rejected.
#[tokio::test]
async fn test_breached_password_rejected() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    env.breach.report_all();

    let request = change("initial-secret", STRONG, STRONG);
    let err = env
        .service
        .change_password(&mut env.dir, "doejan", &request)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "password.pwned");
    assert!(env.dir.writes().is_empty());
    Ok(())
}

/// Tests that an accepted password replaces the old one for binds.
#[tokio::test]
async fn test_changed_password_authenticates() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let svc = env.service.clone();

    let request = change("initial-secret", STRONG, STRONG);
    svc.change_password(&mut env.dir, "doejan", &request).await?;

    assert!(svc.authenticate(&mut env.dir, "doejan", STRONG).await?.is_some());
    assert!(svc
        .authenticate(&mut env.dir, "doejan", "initial-secret")
        .await?
        .is_none());
    Ok(())
}

/// Tests that surrounding whitespace is part of the stored password.
#[tokio::test]
async fn test_padded_password_authenticates() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let svc = env.service.clone();
    let padded = format!(" {STRONG} ");

    let request = change("initial-secret", &padded, &padded);
    svc.change_password(&mut env.dir, "doejan", &request).await?;

    assert!(svc.authenticate(&mut env.dir, "doejan", &padded).await?.is_some());
    assert!(svc.authenticate(&mut env.dir, "doejan", STRONG).await?.is_none());

    let user = env.user("doejan").await?;
    let entry = env.dir.entry(&user.dn).expect("entry");
    let expected = sd_auth::hash::nt_hash(&padded);
    assert_eq!(entry.get_attr("sambaNTPassword"), Some(expected.as_str()));
    Ok(())
}

/// Tests that a reset hands out a working random password.
#[tokio::test]
async fn test_reset_password() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let svc = env.service.clone();

    let password = svc.reset_password(&mut env.dir, "roejon").await?;

    assert_eq!(password.len(), sd_auth::hash::RANDOM_PASSWORD_LENGTH);
    assert!(svc.authenticate(&mut env.dir, "roejon", &password).await?.is_some());

    let user = env.user("roejon").await?;
    assert!(user.samba_pwd_last_set > 0);
    Ok(())
}

/// Tests password operations on unknown users.
#[tokio::test]
async fn test_unknown_user() -> anyhow::Result<()> {
    let mut env = TestEnv::new();

    let err = env
        .service
        .reset_password(&mut env.dir, "nobody")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::NotFound(_)));

    let request = change("a", STRONG, STRONG);
    let err = env
        .service
        .change_password(&mut env.dir, "nobody", &request)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "user.notExists");
    Ok(())
}
