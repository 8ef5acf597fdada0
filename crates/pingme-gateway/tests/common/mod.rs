//! Shared helpers for gateway integration tests

use pingme_common::{
    AppConfig, AppSettings, DirectoryConfig, Environment, JwtAuthenticator, JwtConfig,
    ServerConfig,
};
use pingme_gateway::server;
use pingme_gateway::store::MemoryStore;
use pingme_core::UserId;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const TEST_SECRET: &str = "integration-test-secret-0123456789";

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    pub auth: JwtAuthenticator,
}

fn test_config() -> AppConfig {
    AppConfig {
        app: AppSettings {
            name: "pingme-test".to_string(),
            env: Environment::Development,
        },
        gateway: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            token_expiry: 900,
        },
        directory: DirectoryConfig {
            participant_ttl_secs: 30,
        },
    }
}

/// Bind the gateway on an ephemeral port and serve it in the background.
pub async fn spawn_server() -> TestServer {
    let store = Arc::new(MemoryStore::new());
    let auth = JwtAuthenticator::new(TEST_SECRET, 900);

    let state = server::build_state(test_config(), store.clone(), Arc::new(auth.clone()));
    let app = server::create_app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    TestServer { addr, store, auth }
}

/// Open a websocket with the given raw token (or none at all).
pub async fn connect_raw(server: &TestServer, token: Option<&str>) -> WsClient {
    let url = match token {
        Some(token) => format!("ws://{}/ws?token={token}", server.addr),
        None => format!("ws://{}/ws", server.addr),
    };
    let (ws, _response) = connect_async(url).await.expect("websocket upgrade");
    ws
}

/// Open a websocket authenticated as `user`.
pub async fn connect(server: &TestServer, user: UserId) -> WsClient {
    let token = server.auth.issue(user).expect("issue token");
    connect_raw(server, Some(&token)).await
}

/// Receive the next event frame as JSON, failing after a short timeout.
pub async fn recv_event(ws: &mut WsClient) -> serde_json::Value {
    use futures_util::StreamExt;

    let deadline = Duration::from_secs(2);
    loop {
        let frame = tokio::time::timeout(deadline, ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("connection ended")
            .expect("websocket error");

        match frame {
            tokio_tungstenite::tungstenite::Message::Text(text) => {
                return serde_json::from_str(&text).expect("event is JSON");
            }
            tokio_tungstenite::tungstenite::Message::Ping(_)
            | tokio_tungstenite::tungstenite::Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Assert that no event arrives within `wait`.
pub async fn assert_silent(ws: &mut WsClient, wait: Duration) {
    use futures_util::StreamExt;

    let result = tokio::time::timeout(wait, ws.next()).await;
    assert!(result.is_err(), "expected silence, got {result:?}");
}

/// Assert that the server closes the connection with the given close code.
pub async fn expect_close_code(ws: &mut WsClient, expected: u16) {
    use futures_util::StreamExt;

    let deadline = Duration::from_secs(2);
    let frame = tokio::time::timeout(deadline, ws.next())
        .await
        .expect("timed out waiting for close");

    match frame {
        Some(Ok(tokio_tungstenite::tungstenite::Message::Close(Some(frame)))) => {
            assert_eq!(u16::from(frame.code), expected);
        }
        Some(Ok(other)) => panic!("expected close frame, got {other:?}"),
        Some(Err(e)) => panic!("websocket error while waiting for close: {e}"),
        None => panic!("connection ended without close frame"),
    }
}
