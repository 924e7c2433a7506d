//! Concurrent creation integration tests.

use std::collections::HashSet;

use crate::common::{new_user, TestEnv};

const NAMES: [(&str, &str); 6] = [
    ("Viktor", "Gruber"),
    ("Martha", "Lehmann"),
    ("Oskar", "Brandt"),
    ("Greta", "Schulz"),
    ("Walter", "Fischer"),
    ("Ingrid", "Keller"),
];

/// Tests that concurrent inserts receive distinct numeric ids.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_get_distinct_uid_numbers() -> anyhow::Result<()> {
    let env = TestEnv::new();

    let handles: Vec<_> = NAMES
        .iter()
        .map(|(given, sn)| {
            let service = env.service.clone();
            let mut conn = env.dir.clone();
            let user = new_user(given, sn, "acme");
            tokio::spawn(async move { service.insert(&mut conn, user).await })
        })
        .collect();

    let mut numbers = HashSet::new();
    let mut uids = HashSet::new();
    for handle in handles {
        let user = handle.await??;
        let number = user.uid_number.expect("allocated");
        assert!(number > 1002, "{number} collides with seeded users");
        assert!(numbers.insert(number), "duplicate uidNumber {number}");
        assert!(uids.insert(user.uid.clone()), "duplicate uid {}", user.uid);
    }
    assert_eq!(numbers.len(), NAMES.len());
    Ok(())
}

/// Tests that the uid listing includes users created through the service.
#[tokio::test]
async fn test_uid_listing_follows_inserts() -> anyhow::Result<()> {
    let mut env = TestEnv::new();
    let svc = env.service.clone();

    assert_eq!(svc.all_uids(&mut env.dir).await?, ["doejan", "roejon"]);
    svc.insert(&mut env.dir, new_user("Oskar", "Brandt", "beta")).await?;
    assert_eq!(svc.all_uids(&mut env.dir).await?, ["doejan", "oskbra", "roejon"]);
    Ok(())
}
