//! Test harness running a real leakygate server on a random local port.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use config::Config;
use server::ServeConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// Address of the Redis server used by the Redis-backed tests.
pub const REDIS_ADDRESS: &str = "127.0.0.1:6379";

/// Test client for making HTTP requests to the test server
#[derive(Clone)]
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    /// Create a new test client for the given base URL
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Send a GET request to the given path
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.request(reqwest::Method::GET, path).send().await.unwrap()
    }

    /// Start building a request to the given path, for tests that need custom headers
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }
}

/// Test server that manages the lifecycle of a server instance
pub struct TestServer {
    pub client: TestClient,
    pub address: SocketAddr,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server with the given TOML configuration
    pub async fn start(config_toml: &str) -> Self {
        let config: Config = toml::from_str(config_toml).unwrap();

        // Find an available port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let serve_config = ServeConfig {
            listen_address: address,
            config,
        };

        let (tx, mut rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            // Drop the listener so the server can bind to the address
            drop(listener);

            let _ = tx.send(server::serve(serve_config).await);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;

        if let Ok(Err(e)) = rx.try_recv() {
            panic!("Server failed to start: {e}");
        }

        let client = TestClient::new(format!("http://{address}"));

        // Any answer, even a 404, means the server is accepting connections. Unrouted
        // paths are never admission controlled, so this leaves every bucket full.
        let mut retries = 10;
        while retries > 0 {
            let ready = client.request(reqwest::Method::GET, "/__ready").send();

            if let Ok(Ok(_)) = timeout(Duration::from_millis(100), ready).await {
                break;
            }
            retries -= 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestServer {
            client,
            address,
            _handle: handle,
        }
    }
}

/// Whether a Redis server answers at [`REDIS_ADDRESS`].
pub async fn redis_available() -> bool {
    matches!(
        timeout(Duration::from_millis(500), TcpStream::connect(REDIS_ADDRESS)).await,
        Ok(Ok(_))
    )
}

/// A namespace no other test run shares, so buckets never leak between tests.
pub fn unique_namespace(test: &str) -> String {
    format!("it_{test}_{}:", uuid::Uuid::new_v4().simple())
}
