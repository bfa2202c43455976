//! Mock Gemini API server for testing
//!
//! Simulates the `models/{model}:generateContent` endpoint:
//! - text models answer with `{ candidates: [{ content: { parts: [{ text }] } }] }`
//! - TTS models (name ending in `-tts`) answer with base64 PCM in `inlineData`

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use base64::Engine;
use serde_json::json;

/// Mock Gemini server for testing
pub struct MockGeminiServer {
    port: u16,
    running: Arc<AtomicBool>,
    last_body: Arc<Mutex<Option<String>>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

/// Canned responses and failure switches
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Text returned for generation requests
    pub advice_text: String,
    /// Raw PCM returned for speech requests
    pub pcm: Vec<u8>,
    /// MIME type reported alongside the audio
    pub mime_type: String,
    /// Whether to simulate authentication failure
    pub fail_auth: bool,
    /// Whether to simulate rate limiting
    pub rate_limit: bool,
    /// Delay in milliseconds before responding
    pub delay_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            advice_text: "You are spending sensibly. Try setting aside 10% of each deposit.".to_string(),
            pcm: vec![0x10, 0x00, 0xf0, 0xff, 0x20, 0x00],
            mime_type: "audio/L16;codec=pcm;rate=24000".to_string(),
            fail_auth: false,
            rate_limit: false,
            delay_ms: 0,
        }
    }
}

impl MockGeminiServer {
    /// Start a new mock server on a random available port
    pub fn start(config: MockConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let last_body = Arc::new(Mutex::new(None));
        let last_body_clone = last_body.clone();

        listener.set_nonblocking(true)?;

        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let cfg = config.clone();
                        let sink = last_body_clone.clone();
                        thread::spawn(move || handle_connection(stream, &cfg, &sink));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            last_body,
            thread_handle: Some(thread_handle),
        })
    }

    /// Base URL to hand to the client (stands in for `.../v1beta`)
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Body of the most recent request, if any
    pub fn last_request_body(&self) -> Option<String> {
        self.last_body.lock().ok().and_then(|b| b.clone())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockGeminiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read the request head, then as much body as Content-Length announces.
fn read_request(stream: &mut TcpStream) -> Option<(String, String)> {
    let _ = stream.set_nonblocking(false);
    let mut data = Vec::new();
    let mut buffer = [0u8; 4096];

    let head_end = loop {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buffer[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..head_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while data.len() < head_end + content_length {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..n]);
    }

    let body = String::from_utf8_lossy(&data[head_end..]).to_string();
    Some((head, body))
}

fn handle_connection(mut stream: TcpStream, config: &MockConfig, sink: &Mutex<Option<String>>) {
    let Some((head, body)) = read_request(&mut stream) else {
        return;
    };

    if let Ok(mut last) = sink.lock() {
        *last = Some(body);
    }

    if config.delay_ms > 0 {
        thread::sleep(std::time::Duration::from_millis(config.delay_ms));
    }

    let first_line = head.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        send_response(&mut stream, 400, "Bad Request", r#"{"error": "Invalid request"}"#);
        return;
    }
    let (method, path) = (parts[0], parts[1]);

    let has_key = head.to_lowercase().contains("x-goog-api-key: ");
    if config.fail_auth || !has_key {
        send_response(&mut stream, 403, "Forbidden", r#"{"error": {"message": "API key not valid"}}"#);
        return;
    }

    if config.rate_limit {
        send_response(&mut stream, 429, "Too Many Requests", r#"{"error": {"message": "Quota exceeded"}}"#);
        return;
    }

    let model = path
        .strip_prefix("/models/")
        .and_then(|rest| rest.strip_suffix(":generateContent"));

    match (method, model) {
        ("POST", Some(model)) if model.ends_with("-tts") => {
            let data = base64::engine::general_purpose::STANDARD.encode(&config.pcm);
            let payload = json!({
                "candidates": [{
                    "content": { "parts": [{ "inlineData": { "mimeType": config.mime_type, "data": data } }] }
                }]
            });
            send_response(&mut stream, 200, "OK", &payload.to_string());
        }
        ("POST", Some(_)) => {
            let payload = json!({
                "candidates": [{ "content": { "parts": [{ "text": config.advice_text }] } }]
            });
            send_response(&mut stream, 200, "OK", &payload.to_string());
        }
        ("POST", None) => {
            send_response(&mut stream, 404, "Not Found", r#"{"error": {"message": "Not found"}}"#);
        }
        _ => {
            send_response(&mut stream, 405, "Method Not Allowed", r#"{"error": {"message": "Method not allowed"}}"#);
        }
    }
}

fn send_response(stream: &mut TcpStream, status: u16, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
