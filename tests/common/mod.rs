//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use guardsync::config::InstanceConfig;
use guardsync::remote::{CallGauge, FakeAppliance};
use guardsync::SyncConfig;

/// A request as seen by the mock appliance.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
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

pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MockResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: body.into(),
        }
    }

    pub fn ok() -> Self {
        Self::json(200, "")
    }

    pub fn redirect(location: &str) -> Self {
        Self {
            status: 302,
            headers: vec![("Location".into(), location.into())],
            body: String::new(),
        }
    }
}

pub type RequestLog = Arc<Mutex<Vec<RecordedRequest>>>;

/// Start a programmable mock appliance on an ephemeral port. Every request is
/// recorded and answered by `handler`.
pub async fn start_programmable_appliance<F>(handler: F) -> (SocketAddr, RequestLog)
where
    F: Fn(&RecordedRequest) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let requests = log.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let handler = handler.clone();
                    let requests = requests.clone();
                    tokio::spawn(async move {
                        serve(socket, handler.as_ref(), &requests).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, log)
}

async fn serve<F>(mut socket: TcpStream, handler: &F, requests: &RequestLog)
where
    F: Fn(&RecordedRequest) -> MockResponse,
{
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    let response = handler(&request);
    requests.lock().unwrap().push(request);

    let mut head = format!("HTTP/1.1 {} MOCK\r\n", response.status);
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        response.body.len()
    ));

    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(response.body.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(RecordedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

/// Origin plus `replicas` fake appliances wired into a connector and config.
pub struct FakeFleet {
    pub config: SyncConfig,
    pub origin: Arc<FakeAppliance>,
    pub replicas: Vec<Arc<FakeAppliance>>,
    pub connector: Arc<guardsync::remote::FakeConnector>,
}

pub fn fake_fleet(replicas: usize) -> FakeFleet {
    fake_fleet_with(replicas, |_, _| {})
}

/// Like `fake_fleet`, letting the caller adjust each replica's config.
pub fn fake_fleet_with(replicas: usize, configure: impl Fn(usize, &mut InstanceConfig)) -> FakeFleet {
    build_fleet(replicas, |url| FakeAppliance::new(url), configure)
}

/// Replicas that answer after `delay` and count their calls in `gauge`.
pub fn gauged_fleet(replicas: usize, delay: Duration, gauge: &Arc<CallGauge>) -> FakeFleet {
    build_fleet(
        replicas,
        |url| {
            FakeAppliance::new(url)
                .with_delay(delay)
                .with_gauge(gauge.clone())
        },
        |_, _| {},
    )
}

fn build_fleet(
    replicas: usize,
    make_replica: impl Fn(String) -> FakeAppliance,
    configure: impl Fn(usize, &mut InstanceConfig),
) -> FakeFleet {
    let mut connector = guardsync::remote::FakeConnector::new();
    let origin = Arc::new(FakeAppliance::new("origin"));
    connector.register("http://origin.lan", origin.clone());

    let mut config = SyncConfig {
        origin: InstanceConfig::new("http://origin.lan"),
        ..Default::default()
    };
    let mut fakes = Vec::new();
    for i in 0..replicas {
        let url = format!("http://replica{}.lan", i);
        let fake = Arc::new(make_replica(url.clone()));
        connector.register(url.clone(), fake.clone());
        let mut instance = InstanceConfig::new(url);
        configure(i, &mut instance);
        config.replicas.push(instance);
        fakes.push(fake);
    }

    FakeFleet {
        config,
        origin,
        replicas: fakes,
        connector: Arc::new(connector),
    }
}
