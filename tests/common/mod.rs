//! Minimal hand-rolled HTTP stub server for integration tests: scenario
//! tests drive a real `tokio::net::TcpListener` rather than depending on
//! a mocking crate.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct StubReply {
    pub status: u16,
    pub body: String,
}

impl StubReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into() }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }
}

/// One route per path; a path's queue is consumed front-to-back, repeating
/// the last reply once exhausted (so a handler can say "first call returns
/// X, every call after that returns Y").
pub struct StubServer {
    addr: std::net::SocketAddr,
    hits: Arc<Mutex<HashMap<String, u32>>>,
    in_flight: Arc<AtomicU32>,
    peak_in_flight: Arc<AtomicU32>,
    _accept_loop: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(routes: HashMap<&str, Vec<StubReply>>) -> Self {
        let routes: HashMap<String, VecDeque<StubReply>> = routes
            .into_iter()
            .map(|(path, replies)| (path.to_string(), replies.into_iter().collect()))
            .collect();

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub listener");
        let addr = listener.local_addr().expect("local addr");

        let hits = Arc::new(Mutex::new(HashMap::new()));
        let routes = Arc::new(Mutex::new(routes));
        let in_flight = Arc::new(AtomicU32::new(0));
        let peak_in_flight = Arc::new(AtomicU32::new(0));

        let accept_hits = Arc::clone(&hits);
        let accept_routes = Arc::clone(&routes);
        let accept_in_flight = Arc::clone(&in_flight);
        let accept_peak = Arc::clone(&peak_in_flight);

        let accept_loop = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => break,
                };
                let hits = Arc::clone(&accept_hits);
                let routes = Arc::clone(&accept_routes);
                let in_flight = Arc::clone(&accept_in_flight);
                let peak = Arc::clone(&accept_peak);
                tokio::spawn(async move {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(current, Ordering::SeqCst);
                    let _ = handle_connection(stream, hits, routes).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            addr,
            hits,
            in_flight,
            peak_in_flight,
            _accept_loop: accept_loop,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hit_count(&self, path: &str) -> u32 {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn peak_in_flight(&self) -> u32 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

async fn handle_connection(
    stream: TcpStream,
    hits: Arc<Mutex<HashMap<String, u32>>>,
    routes: Arc<Mutex<HashMap<String, VecDeque<StubReply>>>>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_string();

    loop {
        let mut header_line = String::new();
        let n = reader.read_line(&mut header_line).await?;
        if n == 0 || header_line == "\r\n" || header_line == "\n" {
            break;
        }
    }

    *hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

    let reply = {
        let mut routes = routes.lock().unwrap();
        match routes.get_mut(&path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| StubReply::status(404, "")),
            None => StubReply::status(404, ""),
        }
    };

    let mut stream = reader.into_inner();
    let status_text = status_text(reply.status);
    let response = format!(
        "HTTP/1.1 {} {status_text}\r\nContent-Length: {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n{}",
        reply.status,
        reply.body.len(),
        reply.body,
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        403 => "Forbidden",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
