use indoc::formatdoc;
use integration_tests::{TestServer, redis_available, unique_namespace};

fn redis_config(namespace: &str, limit: u32) -> String {
    formatdoc! {r#"
        [server.rate_limits]
        enabled = true
        namespace = "{namespace}"
        limit = {limit}
        duration = "60s"

        [server.rate_limits.storage]
        type = "redis"
        url = "redis://127.0.0.1:6379/0"
    "#}
}

#[tokio::test]
async fn redis_burst_then_timeout() {
    if !redis_available().await {
        eprintln!("Redis is not running, skipping");
        return;
    }

    let server = TestServer::start(&redis_config(&unique_namespace("burst"), 3)).await;

    let mut statuses = Vec::new();

    for _ in 1..=4 {
        statuses.push(server.client.get("/rl").await.status().as_u16());
    }

    assert_eq!(statuses, [200, 200, 200, 408]);
}

#[tokio::test]
async fn redis_buckets_are_shared_between_servers() {
    if !redis_available().await {
        eprintln!("Redis is not running, skipping");
        return;
    }

    let config = redis_config(&unique_namespace("shared"), 2);

    let first = TestServer::start(&config).await;
    let second = TestServer::start(&config).await;

    assert_eq!(first.client.get("/rl").await.status(), 200);
    assert_eq!(second.client.get("/rl").await.status(), 200);

    // Both servers draw from the one bucket of 127.0.0.1.
    assert_eq!(first.client.get("/rl").await.status(), 408);
}

#[tokio::test]
async fn redis_concurrent_callers_never_exceed_the_limit() {
    if !redis_available().await {
        eprintln!("Redis is not running, skipping");
        return;
    }

    let server = TestServer::start(&redis_config(&unique_namespace("concurrent"), 5)).await;

    let mut set = tokio::task::JoinSet::new();

    for _ in 0..12 {
        let client = server.client.clone();
        set.spawn(async move { client.get("/rl").await.status().as_u16() });
    }

    let mut statuses = Vec::new();

    while let Some(status) = set.join_next().await {
        statuses.push(status.unwrap());
    }

    let admitted = statuses.iter().filter(|status| **status == 200).count();

    assert!(admitted <= 5, "admitted {admitted} requests with a limit of 5");
    assert!(
        statuses.iter().all(|status| [200, 408, 429].contains(status)),
        "unexpected statuses: {statuses:?}"
    );
}
