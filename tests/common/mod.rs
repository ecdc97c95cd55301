//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::sync::Arc;

use appserver::{DefaultApplicationServer, ServerConfig, ServerError};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A server running on an ephemeral local port.
pub struct RunningServer {
    pub server: Arc<DefaultApplicationServer>,
    pub addr: SocketAddr,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl RunningServer {
    #[allow(dead_code)]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Build a server, let `setup` register handlers, then serve on 127.0.0.1:0.
pub async fn start_server<F>(setup: F) -> RunningServer
where
    F: FnOnce(&DefaultApplicationServer),
{
    let mut config = ServerConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;

    let server = Arc::new(DefaultApplicationServer::new(config));
    setup(server.as_ref());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let serving = server.clone();
    let handle = tokio::spawn(async move { serving.serve(listener).await });

    RunningServer {
        server,
        addr,
        handle,
    }
}

/// HTTP client that never reuses connections or goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
