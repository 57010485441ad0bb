//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use geo_gateway::config::{
    CacheConfig, ConnectivityConfig, GatewayConfig, GeocodeSchema, GeocodingEndpoint,
    RouteSchema, RoutingEndpoint, TileEndpoint,
};

/// One request as seen by the mock provider.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path plus query string.
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Canned answer from the mock provider.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl MockResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn bytes(body: &[u8]) -> Self {
        Self {
            status: 200,
            content_type: "image/png",
            body: body.to_vec(),
        }
    }
}

/// Mock HTTP provider on an ephemeral port that records every request.
#[derive(Clone)]
pub struct MockProvider {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockProvider {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

/// Start a mock provider that always answers with `response`.
pub async fn start_mock_provider(response: MockResponse) -> MockProvider {
    start_programmable_provider(move |_| {
        let response = response.clone();
        async move { response }
    })
    .await
}

/// Start a mock provider whose answer is computed per request.
pub async fn start_programmable_provider<F, Fut>(f: F) -> MockProvider
where
    F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockResponse> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let recorded = requests.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let f = f.clone();
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let _ = serve_one(socket, f.as_ref(), &recorded).await;
            });
        }
    });

    MockProvider { addr, requests }
}

async fn serve_one<F, Fut>(
    mut socket: TcpStream,
    f: &F,
    recorded: &Mutex<Vec<RecordedRequest>>,
) -> std::io::Result<()>
where
    F: Fn(RecordedRequest) -> Fut,
    Fut: Future<Output = MockResponse>,
{
    let request = read_request(&mut socket).await?;
    recorded.lock().unwrap().push(request.clone());
    let response = f(request).await;

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        reason(response.status),
        response.content_type,
        response.body.len()
    );
    socket.write_all(head.as_bytes()).await?;
    socket.write_all(&response.body).await?;
    socket.shutdown().await
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Ok(RecordedRequest {
        method,
        target,
        headers,
        body,
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Config with no fallback tiers, no rate limits and one unreachable probe
/// host. Tests wire in mock providers as needed.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig {
        rate_limits: Default::default(),
        cache: CacheConfig::default(),
        connectivity: ConnectivityConfig {
            probe_hosts: vec!["127.0.0.1:1".to_string()],
            probe_timeout_ms: 200,
            probe_interval_secs: 3600,
        },
        ..GatewayConfig::default()
    };
    config.routing.fallback = None;
    config.geocoding.fallback = None;
    config.tiles.fallback = None;
    config
}

pub fn ors_endpoint(base_url: &str) -> RoutingEndpoint {
    RoutingEndpoint {
        name: "openrouteservice".to_string(),
        schema: RouteSchema::OpenRouteService,
        base_url: base_url.to_string(),
        api_key: Some("test-key".to_string()),
    }
}

pub fn osrm_endpoint(base_url: &str) -> RoutingEndpoint {
    RoutingEndpoint {
        name: "osrm".to_string(),
        schema: RouteSchema::Osrm,
        base_url: base_url.to_string(),
        api_key: None,
    }
}

pub fn nominatim_endpoint(base_url: &str) -> GeocodingEndpoint {
    GeocodingEndpoint {
        name: "nominatim".to_string(),
        schema: GeocodeSchema::Nominatim,
        base_url: base_url.to_string(),
        api_key: None,
    }
}

pub fn pelias_endpoint(base_url: &str) -> GeocodingEndpoint {
    GeocodingEndpoint {
        name: "ors-geocode".to_string(),
        schema: GeocodeSchema::Pelias,
        base_url: base_url.to_string(),
        api_key: Some("test-key".to_string()),
    }
}

pub fn tile_endpoint(name: &str, base_url: &str) -> TileEndpoint {
    TileEndpoint {
        name: name.to_string(),
        url_template: format!("{base_url}/{{z}}/{{x}}/{{y}}.png"),
    }
}

pub const ORS_ROUTE: &str = r#"{"routes":[{"summary":{"distance":10000.0,"duration":1200.0},
    "geometry":"_p~iF~ps|U_ulLnnqC",
    "segments":[{"steps":[{"distance":10000.0,"duration":1200.0,"type":11,"instruction":"Head north","name":"MG Road"}]}]}]}"#;

pub const OSRM_ROUTE: &str = r#"{"code":"Ok","routes":[{"distance":9000.0,"duration":900.0,
    "geometry":"_p~iF~ps|U_ulLnnqC",
    "legs":[{"steps":[{"distance":9000.0,"duration":900.0,"name":"Hosur Road","maneuver":{"type":"depart"}}]}]}]}"#;

pub const NOMINATIM_SEARCH: &str = r#"[{"display_name":"MG Road, Bengaluru","lat":"12.9756","lon":"77.6050","type":"primary","importance":0.6}]"#;
