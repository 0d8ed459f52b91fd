//! Local HTTP stub standing in for both the terminal bridge and the Bot API.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use emacross_core::domain::Bar;

/// Route handler: request target and body in, status and JSON body out.
pub type Route = dyn Fn(&str, &str) -> (u16, String) + Send + Sync;

pub struct StubServer {
    pub url: String,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl StubServer {
    pub fn serve(route: impl Fn(&str, &str) -> (u16, String) + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let route: Arc<Route> = Arc::new(route);
        let seen = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let route = Arc::clone(&route);
                let seen = Arc::clone(&seen);
                thread::spawn(move || handle(stream, &*route, &seen));
            }
        });
        Self { url, requests }
    }

    /// Bodies of requests whose target contains `needle`.
    pub fn bodies(&self, needle: &str) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| target.contains(needle))
            .map(|(_, body)| body.clone())
            .collect()
    }
}

fn handle(mut stream: TcpStream, route: &Route, seen: &Mutex<Vec<(String, String)>>) {
    let (target, body) = {
        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).is_err() {
            return;
        }
        let mut content_length = 0usize;
        loop {
            let mut header = String::new();
            match reader.read_line(&mut header) {
                Ok(0) | Err(_) => break,
                Ok(_) if header == "\r\n" => break,
                Ok(_) => {
                    let lower = header.to_ascii_lowercase();
                    if let Some(value) = lower.strip_prefix("content-length:") {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                }
            }
        }
        let mut body = vec![0u8; content_length];
        if reader.read_exact(&mut body).is_err() {
            return;
        }
        let target = request_line
            .split_whitespace()
            .nth(1)
            .unwrap_or_default()
            .to_string();
        (target, String::from_utf8_lossy(&body).into_owned())
    };
    seen.lock().unwrap().push((target.clone(), body.clone()));
    let (status, payload) = route(&target, &body);
    let reply = format!(
        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    );
    let _ = stream.write_all(reply.as_bytes());
}

/// Bars as the bridge's `/rates` document.
pub fn rates_json(bars: &[Bar]) -> String {
    let rows: Vec<String> = bars
        .iter()
        .map(|b| {
            format!(
                r#"{{"time":{},"open":{},"high":{},"low":{},"close":{},"tick_volume":{}}}"#,
                b.open_time.timestamp(),
                b.open,
                b.high,
                b.low,
                b.close,
                b.tick_volume
            )
        })
        .collect();
    format!(r#"{{"rates":[{}]}}"#, rows.join(","))
}
