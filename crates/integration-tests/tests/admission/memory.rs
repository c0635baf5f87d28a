use indoc::{formatdoc, indoc};
use integration_tests::{TestServer, unique_namespace};
use serde_json::json;

#[tokio::test]
async fn burst_is_admitted_then_callers_time_out() {
    let config = indoc! {r#"
        [server.rate_limits]
        enabled = true
        limit = 3
        duration = "60s"
    "#};

    let server = TestServer::start(config).await;

    let mut results = Vec::new();

    for i in 1..=5 {
        let response = server.client.get("/rl").await;

        results.push(json!({
            "request": i,
            "status": response.status().as_u16(),
            "body": response.json::<serde_json::Value>().await.unwrap(),
        }));
    }

    insta::assert_json_snapshot!(results, @r#"
    [
      {
        "request": 1,
        "status": 200,
        "body": {
          "msg": "hit bucket"
        }
      },
      {
        "request": 2,
        "status": 200,
        "body": {
          "msg": "hit bucket"
        }
      },
      {
        "request": 3,
        "status": 200,
        "body": {
          "msg": "hit bucket"
        }
      },
      {
        "request": 4,
        "status": 408,
        "body": {
          "msg": "request timeout"
        }
      },
      {
        "request": 5,
        "status": 408,
        "body": {
          "msg": "request timeout"
        }
      }
    ]
    "#);
}

#[tokio::test]
async fn forwarded_addresses_get_their_own_buckets() {
    let config = indoc! {r#"
        [server.rate_limits]
        enabled = true
        limit = 1
        duration = "60s"
    "#};

    let server = TestServer::start(config).await;

    let mut results = Vec::new();

    for ip in ["192.168.1.1", "192.168.1.2", "192.168.1.1"] {
        let response = server
            .client
            .request(reqwest::Method::GET, "/rl")
            .header("X-Forwarded-For", ip)
            .send()
            .await
            .unwrap();

        results.push(json!({
            "ip": ip,
            "status": response.status().as_u16(),
        }));
    }

    insta::assert_json_snapshot!(results, @r#"
    [
      {
        "ip": "192.168.1.1",
        "status": 200
      },
      {
        "ip": "192.168.1.2",
        "status": 200
      },
      {
        "ip": "192.168.1.1",
        "status": 408
      }
    ]
    "#);
}

#[tokio::test]
async fn header_identity() {
    let config = indoc! {r#"
        [server.rate_limits]
        enabled = true
        dimension = "client"
        source = { http_header = "X-Client-Id" }
        limit = 1
        duration = "60s"
    "#};

    let server = TestServer::start(config).await;

    let send = |client_id: Option<&'static str>| {
        let mut request = server.client.request(reqwest::Method::GET, "/rl");

        if let Some(client_id) = client_id {
            request = request.header("X-Client-Id", client_id);
        }

        request.send()
    };

    assert_eq!(send(Some("tenant-a")).await.unwrap().status(), 200);
    assert_eq!(send(Some("tenant-b")).await.unwrap().status(), 200);

    let response = send(None).await.unwrap();
    assert_eq!(response.status(), 400);

    let body = response.text().await.unwrap();
    insta::assert_snapshot!(body, @r#"{"msg":"missing caller identity"}"#);
}

#[tokio::test]
async fn every_judged_request_carries_a_request_id() {
    let config = formatdoc! {r#"
        [server.rate_limits]
        enabled = true
        namespace = "{namespace}"
        limit = 1
        duration = "60s"
    "#, namespace = unique_namespace("request_id")};

    let server = TestServer::start(&config).await;

    let admitted = server.client.get("/rl").await;
    let rejected = server.client.get("/rl").await;

    assert_eq!(admitted.status(), 200);
    assert_eq!(rejected.status(), 408);

    let admitted_id = admitted.headers().get("x-request-id").unwrap().to_str().unwrap().to_string();
    let rejected_id = rejected.headers().get("x-request-id").unwrap().to_str().unwrap().to_string();

    assert_eq!(admitted_id.len(), 32);
    assert_ne!(admitted_id, rejected_id);
}

#[tokio::test]
async fn disabled_gate_admits_everything() {
    let server = TestServer::start("").await;

    let mut success_count = 0;

    for _ in 1..=20 {
        if server.client.get("/rl").await.status() == 200 {
            success_count += 1;
        }
    }

    assert_eq!(success_count, 20);
}

#[tokio::test]
async fn health_is_never_throttled() {
    let config = indoc! {r#"
        [server.rate_limits]
        enabled = true
        limit = 1
        duration = "60s"
    "#};

    let server = TestServer::start(config).await;

    assert_eq!(server.client.get("/rl").await.status(), 200);

    for _ in 1..=10 {
        assert_eq!(server.client.get("/health").await.status(), 200);
    }
}

#[tokio::test]
async fn unknown_paths_leave_the_bucket_alone() {
    let config = indoc! {r#"
        [server.rate_limits]
        enabled = true
        limit = 1
        duration = "60s"
    "#};

    let server = TestServer::start(config).await;

    let missing = server.client.get("/does-not-exist").await;
    assert_eq!(missing.status(), 404);
    assert!(missing.headers().get("x-request-id").is_none());

    assert_eq!(server.client.get("/rl").await.status(), 200);
    assert_eq!(server.client.get("/rl").await.status(), 408);
}

#[tokio::test]
async fn bucket_refills_after_the_window() {
    let config = indoc! {r#"
        [server.rate_limits]
        enabled = true
        limit = 1
        duration = "1s"
    "#};

    let server = TestServer::start(config).await;

    assert_eq!(server.client.get("/rl").await.status(), 200);

    // The wait hint is under the deadline, so the caller is held until the refill.
    let started = std::time::Instant::now();
    assert_eq!(server.client.get("/rl").await.status(), 200);
    assert!(started.elapsed() < std::time::Duration::from_secs(3));
}
