#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use kalshi_odds_proxy::{
    KalshiAuth, KalshiEnvironment, KalshiRestClient, OddsService, RateLimitConfig, ServiceKey,
};
use reqwest::StatusCode;
use rsa::RsaPrivateKey;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

pub const SERVICE_KEY: &str = "svc-test-key";

#[derive(Clone)]
pub struct TestHttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl TestHttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(StatusCode::OK, body.to_string())
    }
}

/// Handle on a scripted upstream.
pub struct MockUpstream {
    pub origin: Url,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockUpstream {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Request lines seen so far, e.g. `GET /trade-api/v2/markets?limit=100 HTTP/1.1`.
    pub fn request_lines(&self) -> Vec<String> {
        self.requests.lock().expect("lock").clone()
    }

    pub fn client(&self) -> KalshiRestClient {
        let env = KalshiEnvironment::with_origin(self.origin.as_str()).expect("origin");
        KalshiRestClient::builder(env, test_auth())
            .with_rate_limit_config(RateLimitConfig { read_rps: 0 })
            .build()
            .expect("client")
    }

    pub fn service(&self) -> OddsService {
        OddsService::new(self.client())
    }
}

pub fn test_auth() -> KalshiAuth {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    let key = KEY
        .get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("rsa key"))
        .clone();
    KalshiAuth::from_private_key("test-key-id", key)
}

pub fn service_key() -> Arc<ServiceKey> {
    Arc::new(ServiceKey::new(SERVICE_KEY).expect("service key"))
}

/// `count` markets with tickers `{prefix}-{n}` starting at `start`.
pub fn markets(prefix: &str, start: usize, count: usize) -> Vec<Value> {
    (start..start + count)
        .map(|n| {
            json!({
                "ticker": format!("{prefix}-{n}"),
                "title": format!("{prefix} market {n}"),
                "yes_bid": 40,
                "yes_ask": 42,
            })
        })
        .collect()
}

pub fn markets_page(markets: Vec<Value>, cursor: Option<&str>) -> TestHttpResponse {
    TestHttpResponse::ok(json!({ "markets": markets, "cursor": cursor }))
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

async fn read_request_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 2048];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(end) = header_end(&buffer) {
            buffer.truncate(end);
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buffer).to_string())
}

/// Serve `responses` in order, one connection each, then stop accepting.
pub async fn spawn_http_sequence_server(responses: Vec<TestHttpResponse>) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let hits_ref = Arc::clone(&hits);
    let requests_ref = Arc::clone(&requests);

    tokio::spawn(async move {
        for response in responses {
            let (mut stream, _) = listener.accept().await?;
            let head = read_request_head(&mut stream).await?;
            let line = head.lines().next().unwrap_or_default().to_string();
            requests_ref.lock().expect("lock").push(line);
            hits_ref.fetch_add(1, Ordering::Relaxed);

            let reply = format!(
                "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
                response.status.as_u16(),
                response.status.canonical_reason().unwrap_or("Unknown"),
                response.body.len(),
                response.body
            );
            stream.write_all(reply.as_bytes()).await?;
            stream.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    MockUpstream {
        origin: Url::parse(&format!("http://{addr}")).expect("url"),
        hits,
        requests,
    }
}
