//! Minimal HTTP/1.1 repository server for integration tests.
//!
//! Keeps artifacts and WebDAV collections in memory. Supports HEAD, ranged and
//! conditional GET, PUT, MKCOL, OPTIONS, Basic auth, redirects and slow or
//! truncated bodies. Every response carries `Connection: close`, one thread
//! per connection.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const LAST_MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// If false, HEAD returns 405 (servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and conditionals and always sends 200.
    pub support_ranges: bool,
    /// WebDAV mode: OPTIONS advertises DAV, PUT needs existing parents, MKCOL works.
    pub dav: bool,
    /// Required `Authorization` header value, e.g. `Basic ...`.
    pub authorization: Option<String>,
    /// Pause after every body chunk.
    pub chunk_delay: Option<Duration>,
    /// Send this many body bytes, then stall this long and close.
    pub stall: Option<(usize, Duration)>,
    /// First GET body is cut after this many bytes (Content-Length stays full).
    pub truncate_first_get: Option<usize>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            dav: false,
            authorization: None,
            chunk_delay: None,
            stall: None,
            truncate_first_get: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

struct Entry {
    body: Vec<u8>,
    etag: String,
}

#[derive(Default)]
struct State {
    files: HashMap<String, Entry>,
    collections: HashSet<String>,
    redirects: HashMap<String, String>,
    /// Canned statuses answered, in order, to the next requests of a method.
    failures: HashMap<String, Vec<String>>,
    requests: Vec<RecordedRequest>,
}

#[derive(Clone)]
pub struct RepoServer {
    base: String,
    state: Arc<Mutex<State>>,
}

impl RepoServer {
    /// Start on an ephemeral port. The server runs until the process exits.
    pub fn start(opts: ServerOptions) -> RepoServer {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State::default()));
        let truncated = Arc::new(AtomicBool::new(false));
        let server_state = Arc::clone(&state);
        let opts = Arc::new(opts);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&server_state);
                let opts = Arc::clone(&opts);
                let truncated = Arc::clone(&truncated);
                thread::spawn(move || handle(stream, &state, &opts, &truncated));
            }
        });
        RepoServer {
            base: format!("http://127.0.0.1:{}/", port),
            state,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Answer the next request with `method` by `status` (e.g. `"503 Service
    /// Unavailable"`) instead of serving it. Queued statuses are used in order.
    pub fn fail_next(&self, method: &str, status: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(method.to_string())
            .or_default()
            .push(status.to_string());
    }

    pub fn put_file(&self, path: &str, body: Vec<u8>, etag: &str) {
        self.state.lock().unwrap().files.insert(
            path.to_string(),
            Entry {
                body,
                etag: etag.to_string(),
            },
        );
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).map(|e| e.body.clone())
    }

    pub fn add_collection(&self, path: &str) {
        self.state.lock().unwrap().collections.insert(path.to_string());
    }

    /// Answer requests for `from` with a redirect to `to` (absolute path).
    pub fn redirect(&self, from: &str, to: &str) {
        self.state
            .lock()
            .unwrap()
            .redirects
            .insert(from.to_string(), to.to_string());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .count()
    }
}

struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };
    let text = std::str::from_utf8(&buf[..header_end]).ok()?;
    let mut lines = text.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let target = first.next()?;
    let path = target.trim_start_matches('/').to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();
    let length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = (header_end + length).min(buf.len());
    Some(Request {
        method,
        path,
        headers,
        body: buf[header_end..end].to_vec(),
    })
}

fn respond(stream: &mut TcpStream, status: &str, headers: &[(&str, String)], body: &[u8]) {
    let mut head = format!("HTTP/1.1 {}\r\nConnection: close\r\n", status);
    for (n, v) in headers {
        head.push_str(&format!("{}: {}\r\n", n, v));
    }
    if !headers.iter().any(|(n, _)| n.eq_ignore_ascii_case("content-length")) {
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn parent_exists(state: &State, path: &str) -> bool {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        None => true,
        Some(idx) => state.collections.contains(&trimmed[..=idx]),
    }
}

/// `Range: bytes=N-` or `bytes=N-M` as (start, inclusive end).
fn range_spec(req: &Request) -> Option<(u64, Option<u64>)> {
    let v = req.header("range")?;
    let rest = v.strip_prefix("bytes=")?;
    let (start, end) = rest.split_once('-')?;
    let end = match end.trim() {
        "" => None,
        e => Some(e.parse().ok()?),
    };
    Some((start.trim().parse().ok()?, end))
}

fn handle(
    mut stream: TcpStream,
    state: &Mutex<State>,
    opts: &ServerOptions,
    truncated: &AtomicBool,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    state.lock().unwrap().requests.push(RecordedRequest {
        method: req.method.clone(),
        path: req.path.clone(),
        headers: req.headers.clone(),
    });

    if let Some(expected) = &opts.authorization {
        if req.header("authorization") != Some(expected.as_str()) {
            respond(
                &mut stream,
                "401 Unauthorized",
                &[("WWW-Authenticate", "Basic realm=\"repo\"".to_string())],
                b"",
            );
            return;
        }
    }

    let failure = {
        let mut st = state.lock().unwrap();
        st.failures
            .get_mut(&req.method)
            .filter(|q| !q.is_empty())
            .map(|q| q.remove(0))
    };
    if let Some(status) = failure {
        respond(&mut stream, &status, &[], b"");
        return;
    }

    let redirect = state.lock().unwrap().redirects.get(&req.path).cloned();
    if let Some(location) = redirect {
        let status = if req.method == "PUT" {
            "307 Temporary Redirect"
        } else {
            "302 Found"
        };
        respond(&mut stream, status, &[("Location", location)], b"");
        return;
    }

    match req.method.as_str() {
        "OPTIONS" => {
            let mut headers = vec![("Allow", "GET, HEAD, PUT, OPTIONS, MKCOL".to_string())];
            if opts.dav {
                headers.push(("DAV", "1, 2".to_string()));
            }
            respond(&mut stream, "200 OK", &headers, b"");
        }
        "MKCOL" => {
            let mut st = state.lock().unwrap();
            let status = if st.collections.contains(&req.path) {
                "405 Method Not Allowed"
            } else if !parent_exists(&st, &req.path) {
                "409 Conflict"
            } else {
                st.collections.insert(req.path.clone());
                "201 Created"
            };
            drop(st);
            respond(&mut stream, status, &[], b"");
        }
        "PUT" => {
            let mut st = state.lock().unwrap();
            if opts.dav && !parent_exists(&st, &req.path) {
                drop(st);
                respond(&mut stream, "409 Conflict", &[], b"");
                return;
            }
            let etag = format!("\"put-{}\"", req.body.len());
            st.files.insert(
                req.path.clone(),
                Entry {
                    body: req.body.clone(),
                    etag,
                },
            );
            drop(st);
            respond(&mut stream, "201 Created", &[], b"");
        }
        "HEAD" | "GET" => serve(&mut stream, &req, state, opts, truncated),
        _ => respond(&mut stream, "405 Method Not Allowed", &[], b""),
    }
}

fn serve(
    stream: &mut TcpStream,
    req: &Request,
    state: &Mutex<State>,
    opts: &ServerOptions,
    truncated: &AtomicBool,
) {
    if req.method == "HEAD" && !opts.head_allowed {
        respond(stream, "405 Method Not Allowed", &[], b"");
        return;
    }
    let found = {
        let st = state.lock().unwrap();
        st.files
            .get(&req.path)
            .map(|e| (e.body.clone(), e.etag.clone()))
    };
    let Some((body, etag)) = found else {
        respond(stream, "404 Not Found", &[], b"not found");
        return;
    };
    let total = body.len() as u64;
    let mut headers = vec![
        ("ETag", etag.clone()),
        ("Last-Modified", LAST_MODIFIED.to_string()),
        ("Accept-Ranges", "bytes".to_string()),
    ];

    if opts.support_ranges {
        if let Some((from, to)) = range_spec(req) {
            let if_match_failed = req.header("if-match").map(|v| v != etag).unwrap_or(false);
            let unmodified_failed = req
                .header("if-unmodified-since")
                .map(|v| v != LAST_MODIFIED)
                .unwrap_or(false);
            if if_match_failed || unmodified_failed {
                respond(stream, "412 Precondition Failed", &[], b"");
                return;
            }
            if from >= total {
                headers.push(("Content-Range", format!("bytes */{}", total)));
                respond(stream, "416 Range Not Satisfiable", &headers, b"");
                return;
            }
            let end = to.unwrap_or(total - 1).min(total - 1);
            headers.push(("Content-Range", format!("bytes {}-{}/{}", from, end, total)));
            let slice = &body[from as usize..=end as usize];
            headers.push(("Content-Length", slice.len().to_string()));
            send_body(stream, "206 Partial Content", &headers, slice, req, opts, truncated);
            return;
        }
    }
    headers.push(("Content-Length", total.to_string()));
    send_body(stream, "200 OK", &headers, &body, req, opts, truncated);
}

fn send_body(
    stream: &mut TcpStream,
    status: &str,
    headers: &[(&str, String)],
    body: &[u8],
    req: &Request,
    opts: &ServerOptions,
    truncated: &AtomicBool,
) {
    if req.method == "HEAD" {
        respond(stream, status, headers, b"");
        return;
    }
    respond(stream, status, headers, b"");
    let mut limit = body.len();
    if let Some(cut) = opts.truncate_first_get {
        if !truncated.swap(true, Ordering::SeqCst) {
            limit = cut.min(body.len());
        }
    }
    if let Some((sent, pause)) = opts.stall {
        let _ = stream.write_all(&body[..sent.min(body.len())]);
        let _ = stream.flush();
        thread::sleep(pause);
        return;
    }
    for chunk in body[..limit].chunks(4096) {
        if stream.write_all(chunk).is_err() {
            return;
        }
        if let Some(d) = opts.chunk_delay {
            let _ = stream.flush();
            thread::sleep(d);
        }
    }
}
