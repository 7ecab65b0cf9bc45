//! Easy2 handler owned by one pooled connection.
//!
//! The handler outlives calls: it carries the connection's socket set for its
//! whole life, and per-call state (response headers, body target, upload body,
//! listener, cancel token) between `begin` and `finish_call`.
//!
//! For downloads, the decision to write a body is taken once per response
//! block, when its header block ends: a 2xx body is written (restarting the
//! sink if the server ignored the range), a 206 is checked against the resume
//! token before a single byte lands on disk, anything else is discarded.

use std::io::{self, Read, Seek, SeekFrom};
use std::str;
use std::sync::Arc;

use curl::easy::{Handler, ReadError, SeekResult, WriteError};

use crate::cancel::CancelToken;
use crate::checksum::StreamingDigest;
use crate::resume::{check_resume, ResumeToken};
use crate::sink::LocalSink;
use crate::socket::SocketSet;
use crate::validators::{parse_response_head, ResponseHead, Validators};

use super::listener::TransferListener;

/// Readable, rewindable upload body.
pub trait UploadReader: Read + Seek + Send {}

impl<T: Read + Seek + Send> UploadReader for T {}

/// Why a callback stopped the transfer on purpose.
#[derive(Debug)]
pub(crate) enum Abort {
    /// 206 that does not continue the token's revision at the token's offset.
    ResumeRejected(String),
    /// 206 to a request that asked for no range.
    UnexpectedPartial,
    /// Range request got a full 200; the headers are all we wanted.
    HeadersComplete,
    /// Sink write or upload read failed.
    Local(io::Error),
}

/// Body accepted for writing.
#[derive(Debug, Clone)]
pub(crate) struct Accepted {
    /// Artifact offset of the first body byte.
    pub(crate) base: u64,
    /// Body length announced by the server.
    pub(crate) expected: Option<u64>,
    pub(crate) validators: Validators,
}

/// Download state moved into the handler for one GET and taken back after.
pub(crate) struct Download {
    pub(crate) sink: LocalSink,
    pub(crate) resume: Option<ResumeToken>,
    pub(crate) digest: Option<StreamingDigest>,
    pub(crate) accepted: Option<Accepted>,
    /// Body bytes written for the accepted response.
    pub(crate) written: u64,
    /// A full response replaced the resume; the sink is truncated before the
    /// first body byte. Deferred because a proxy's CONNECT reply is also a 2xx
    /// header block.
    restart: bool,
}

impl Download {
    pub(crate) fn new(
        sink: LocalSink,
        resume: Option<ResumeToken>,
        digest: Option<StreamingDigest>,
    ) -> Self {
        Self {
            sink,
            resume,
            digest,
            accepted: None,
            written: 0,
            restart: false,
        }
    }

    /// Token for the bytes still on disk after a failed attempt: the new
    /// partial if a body was written, else the incoming token unless a restart
    /// already discarded its prefix.
    pub(crate) fn retained_token(&self) -> Option<ResumeToken> {
        self.partial_token().or_else(|| self.resume.clone())
    }

    /// Drop the kept prefix once a full body really starts.
    pub(crate) fn apply_restart(&mut self) -> io::Result<()> {
        if !self.restart {
            return Ok(());
        }
        self.restart = false;
        if let Some(token) = self.resume.take() {
            tracing::info!(offset = token.offset, "server sent the full resource; restarting from 0");
        }
        self.sink.discard()?;
        if let Some(digest) = self.digest.as_mut() {
            digest.reset();
        }
        Ok(())
    }

    /// Token to continue from what is on disk, if the bytes can be trusted later.
    pub(crate) fn partial_token(&self) -> Option<ResumeToken> {
        let acc = self.accepted.as_ref()?;
        let offset = acc.base + self.written;
        if offset == 0 || !acc.validators.has_identity() || acc.validators.has_weak_etag() {
            return None;
        }
        Some(ResumeToken::new(offset, acc.validators.clone()))
    }
}

pub(crate) enum BodyTarget {
    /// Drop any body (HEAD, MKCOL, OPTIONS, PUT responses).
    Discard,
    /// One-byte range request for servers that refuse HEAD.
    HeadOnly,
    Download(Download),
}

impl Default for BodyTarget {
    fn default() -> Self {
        BodyTarget::Discard
    }
}

#[derive(Default)]
struct CallState {
    headers: Vec<String>,
    target: BodyTarget,
    upload: Option<Box<dyn UploadReader>>,
    /// Read position in the upload body; moves back when libcurl rewinds.
    sent: u64,
    /// Highest position reported to the listener.
    reported: u64,
    listener: Option<Arc<dyn TransferListener>>,
    cancel: Option<CancelToken>,
    abort: Option<Abort>,
    /// Current response block's body goes to the download sink.
    writing: bool,
}

pub struct TransferHandler {
    sockets: Arc<SocketSet>,
    call: CallState,
}

impl Default for TransferHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferHandler {
    pub fn new() -> Self {
        Self {
            sockets: Arc::new(SocketSet::new()),
            call: CallState::default(),
        }
    }

    pub fn sockets(&self) -> &Arc<SocketSet> {
        &self.sockets
    }

    pub(crate) fn begin(
        &mut self,
        cancel: &CancelToken,
        listener: &Arc<dyn TransferListener>,
        target: BodyTarget,
        upload: Option<Box<dyn UploadReader>>,
    ) {
        self.call = CallState {
            target,
            upload,
            listener: Some(Arc::clone(listener)),
            cancel: Some(cancel.clone()),
            ..CallState::default()
        };
    }

    /// Status and headers of the last response block received.
    pub(crate) fn response_head(&self) -> ResponseHead {
        parse_response_head(&self.call.headers)
    }

    pub(crate) fn take_abort(&mut self) -> Option<Abort> {
        self.call.abort.take()
    }

    pub(crate) fn take_download(&mut self) -> Option<Download> {
        match std::mem::take(&mut self.call.target) {
            BodyTarget::Download(d) => Some(d),
            other => {
                self.call.target = other;
                None
            }
        }
    }

    /// Release per-call state (sink, upload body, listener).
    pub(crate) fn finish_call(&mut self) {
        self.call = CallState::default();
    }

    fn cancelled(&self) -> bool {
        self.call
            .cancel
            .as_ref()
            .map(CancelToken::is_cancelled)
            .unwrap_or(false)
    }

    fn started(&self, offset: u64, length: Option<u64>) {
        if let Some(l) = &self.call.listener {
            l.transfer_started(offset, length);
        }
    }

    /// Decide what to do with the body of the block whose headers just ended.
    fn end_of_headers(&mut self) -> bool {
        let head = parse_response_head(&self.call.headers);
        let Some(status) = head.status else {
            return true;
        };
        if (300..400).contains(&status) {
            if let Some(location) = &head.location {
                tracing::debug!(status, location = %location, "redirect");
            }
            return true;
        }
        if !(200..300).contains(&status) {
            return true;
        }
        match &mut self.call.target {
            BodyTarget::Discard => true,
            BodyTarget::HeadOnly => {
                if status != 206 {
                    self.call.abort = Some(Abort::HeadersComplete);
                    return false;
                }
                true
            }
            BodyTarget::Download(d) => {
                let decision = accept_body(d, status, &head);
                match decision {
                    Ok(acc) => {
                        let (base, expected) = (acc.base, acc.expected);
                        d.accepted = Some(acc);
                        d.written = 0;
                        self.call.writing = true;
                        self.started(base, expected);
                        true
                    }
                    Err(abort) => {
                        self.call.abort = Some(abort);
                        false
                    }
                }
            }
        }
    }
}

/// Where a 2xx body lands, or why it must not land at all.
fn accept_body(d: &mut Download, status: u32, head: &ResponseHead) -> Result<Accepted, Abort> {
    let validators = head.validators();
    d.restart = status != 206 && d.resume.is_some();
    if status != 206 {
        return Ok(Accepted {
            base: 0,
            expected: head.content_length,
            validators,
        });
    }

    let Some(token) = d.resume.as_ref() else {
        return Err(Abort::UnexpectedPartial);
    };
    let Some(range) = head.content_range else {
        return Err(Abort::ResumeRejected("206 without Content-Range".into()));
    };
    if range.start != token.offset {
        return Err(Abort::ResumeRejected(format!(
            "Content-Range starts at {}, expected {}",
            range.start, token.offset
        )));
    }
    check_resume(token, &validators).map_err(|m| Abort::ResumeRejected(m.to_string()))?;
    tracing::debug!(offset = token.offset, "resume accepted");
    Ok(Accepted {
        base: token.offset,
        expected: head.content_length,
        validators,
    })
}

impl Handler for TransferHandler {
    fn header(&mut self, data: &[u8]) -> bool {
        let Ok(s) = str::from_utf8(data) else {
            return true;
        };
        let line = s.trim_end();
        if line.starts_with("HTTP/") {
            self.call.headers.clear();
            self.call.writing = false;
            self.call.headers.push(line.to_string());
            return true;
        }
        if !line.is_empty() {
            self.call.headers.push(line.to_string());
            return true;
        }
        self.end_of_headers()
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if !self.call.writing {
            return Ok(data.len());
        }
        if self.cancelled() {
            return Ok(0);
        }
        let call = &mut self.call;
        let BodyTarget::Download(d) = &mut call.target else {
            return Ok(data.len());
        };
        let Some(acc) = d.accepted.as_ref() else {
            return Ok(data.len());
        };
        let offset = acc.base + d.written;
        if let Err(e) = d.apply_restart().and_then(|()| d.sink.write_at(offset, data)) {
            tracing::warn!(path = %d.sink.path().display(), "sink write failed: {}", e);
            call.abort = Some(Abort::Local(e));
            return Ok(0);
        }
        if let Some(digest) = d.digest.as_mut() {
            digest.update(data);
        }
        d.written += data.len() as u64;
        if let Some(l) = &call.listener {
            l.transfer_progressed(d.written);
        }
        Ok(data.len())
    }

    fn read(&mut self, into: &mut [u8]) -> Result<usize, ReadError> {
        if self.cancelled() {
            return Err(ReadError::Abort);
        }
        let call = &mut self.call;
        let Some(reader) = call.upload.as_mut() else {
            return Ok(0);
        };
        match reader.read(into) {
            Ok(n) => {
                call.sent += n as u64;
                if call.sent > call.reported {
                    call.reported = call.sent;
                    if let Some(l) = &call.listener {
                        l.transfer_progressed(call.reported);
                    }
                }
                Ok(n)
            }
            Err(e) => {
                tracing::warn!("upload body read failed: {}", e);
                call.abort = Some(Abort::Local(e));
                Err(ReadError::Abort)
            }
        }
    }

    fn seek(&mut self, whence: SeekFrom) -> SeekResult {
        let Some(reader) = self.call.upload.as_mut() else {
            return SeekResult::CantSeek;
        };
        match reader.seek(whence) {
            Ok(pos) => {
                self.call.sent = pos;
                SeekResult::Ok
            }
            Err(_) => SeekResult::Fail,
        }
    }

    fn progress(&mut self, _dltotal: f64, _dlnow: f64, _ultotal: f64, _ulnow: f64) -> bool {
        !self.cancelled()
    }

    #[cfg(unix)]
    fn open_socket(
        &mut self,
        family: std::os::raw::c_int,
        socktype: std::os::raw::c_int,
        protocol: std::os::raw::c_int,
    ) -> Option<curl_sys::curl_socket_t> {
        crate::socket::InterruptibleSocketFactory::INSTANCE.open(
            &self.sockets,
            family,
            socktype,
            protocol,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::NoopListener;

    fn handler_with(target: BodyTarget) -> TransferHandler {
        let mut h = TransferHandler::new();
        let listener: Arc<dyn TransferListener> = Arc::new(NoopListener);
        h.begin(&CancelToken::new(), &listener, target, None);
        h
    }

    fn feed(h: &mut TransferHandler, lines: &[&str]) -> bool {
        for l in lines {
            if !h.header(format!("{}\r\n", l).as_bytes()) {
                return false;
            }
        }
        h.header(b"\r\n")
    }

    fn validators(etag: &str, len: u64) -> Validators {
        Validators {
            etag: Some(etag.into()),
            last_modified: None,
            length: Some(len),
        }
    }

    fn partial_file(dir: &tempfile::TempDir, content: &[u8], keep: u64) -> LocalSink {
        let path = dir.path().join("artifact.bin");
        std::fs::write(&path, content).unwrap();
        LocalSink::open_for_resume(&path, keep).unwrap().unwrap()
    }

    #[test]
    fn headers_reset_on_each_status_line() {
        let mut h = handler_with(BodyTarget::Discard);
        assert!(feed(&mut h, &["HTTP/1.1 302 Found", "Location: /elsewhere"]));
        assert!(feed(&mut h, &["HTTP/1.1 200 OK", "Content-Length: 3"]));
        let head = h.response_head();
        assert_eq!(head.status, Some(200));
        assert!(head.location.is_none());
    }

    #[test]
    fn matching_partial_response_writes_after_offset() {
        let dir = tempfile::tempdir().unwrap();
        let sink = partial_file(&dir, b"abcd", 4);
        let token = ResumeToken::new(4, validators("\"v1\"", 8));
        let mut h = handler_with(BodyTarget::Download(Download::new(sink, Some(token), None)));
        assert!(feed(
            &mut h,
            &[
                "HTTP/1.1 206 Partial Content",
                "Content-Range: bytes 4-7/8",
                "Content-Length: 4",
                "ETag: \"v1\"",
            ]
        ));
        assert_eq!(h.write(b"efgh").unwrap(), 4);
        let d = h.take_download().unwrap();
        assert_eq!(d.written, 4);
        assert_eq!(d.accepted.as_ref().unwrap().base, 4);
        assert_eq!(std::fs::read(d.sink.path()).unwrap(), b"abcdefgh");
    }

    #[test]
    fn changed_validator_aborts_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = partial_file(&dir, b"abcd", 4);
        let token = ResumeToken::new(4, validators("\"v1\"", 8));
        let mut h = handler_with(BodyTarget::Download(Download::new(sink, Some(token), None)));
        let ok = feed(
            &mut h,
            &[
                "HTTP/1.1 206 Partial Content",
                "Content-Range: bytes 4-7/8",
                "ETag: \"v2\"",
            ],
        );
        assert!(!ok);
        assert!(matches!(h.take_abort(), Some(Abort::ResumeRejected(_))));
    }

    #[test]
    fn wrong_range_start_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let sink = partial_file(&dir, b"abcd", 4);
        let token = ResumeToken::new(4, validators("\"v1\"", 8));
        let mut h = handler_with(BodyTarget::Download(Download::new(sink, Some(token), None)));
        assert!(!feed(
            &mut h,
            &[
                "HTTP/1.1 206 Partial Content",
                "Content-Range: bytes 0-7/8",
                "ETag: \"v1\"",
            ]
        ));
    }

    #[test]
    fn full_response_to_range_request_restarts_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink = partial_file(&dir, b"stale", 5);
        let token = ResumeToken::new(5, validators("\"v1\"", 8));
        let mut h = handler_with(BodyTarget::Download(Download::new(sink, Some(token), None)));
        assert!(feed(&mut h, &["HTTP/1.1 200 OK", "Content-Length: 3", "ETag: \"v2\""]));
        assert_eq!(h.write(b"new").unwrap(), 3);
        let d = h.take_download().unwrap();
        assert_eq!(d.accepted.as_ref().unwrap().base, 0);
        assert!(d.resume.is_none());
        assert_eq!(std::fs::read(d.sink.path()).unwrap(), b"new");
    }

    #[test]
    fn proxy_connect_block_keeps_resume() {
        let dir = tempfile::tempdir().unwrap();
        let sink = partial_file(&dir, b"abcd", 4);
        let token = ResumeToken::new(4, validators("\"v1\"", 8));
        let mut h = handler_with(BodyTarget::Download(Download::new(sink, Some(token), None)));
        assert!(feed(&mut h, &["HTTP/1.1 200 Connection established"]));
        assert!(feed(
            &mut h,
            &[
                "HTTP/1.1 206 Partial Content",
                "Content-Range: bytes 4-7/8",
                "ETag: \"v1\"",
            ]
        ));
        assert_eq!(h.write(b"efgh").unwrap(), 4);
        let d = h.take_download().unwrap();
        assert_eq!(std::fs::read(d.sink.path()).unwrap(), b"abcdefgh");
    }

    #[test]
    fn error_bodies_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalSink::create(&dir.path().join("x.bin")).unwrap();
        let mut h = handler_with(BodyTarget::Download(Download::new(sink, None, None)));
        assert!(feed(&mut h, &["HTTP/1.1 404 Not Found", "Content-Length: 9"]));
        assert_eq!(h.write(b"not found").unwrap(), 9);
        let d = h.take_download().unwrap();
        assert!(d.accepted.is_none());
        assert_eq!(d.sink.len().unwrap(), 0);
    }

    #[test]
    fn unrequested_partial_response_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalSink::create(&dir.path().join("y.bin")).unwrap();
        let mut h = handler_with(BodyTarget::Download(Download::new(sink, None, None)));
        assert!(!feed(
            &mut h,
            &["HTTP/1.1 206 Partial Content", "Content-Range: bytes 0-1/2"]
        ));
        assert!(matches!(h.take_abort(), Some(Abort::UnexpectedPartial)));
    }

    #[test]
    fn cancelled_call_stops_progress_and_writes() {
        let mut h = TransferHandler::new();
        let listener: Arc<dyn TransferListener> = Arc::new(NoopListener);
        let token = CancelToken::new();
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalSink::create(&dir.path().join("z.bin")).unwrap();
        h.begin(&token, &listener, BodyTarget::Download(Download::new(sink, None, None)), None);
        assert!(feed(&mut h, &["HTTP/1.1 200 OK"]));
        assert!(h.progress(0.0, 0.0, 0.0, 0.0));
        token.cancel();
        assert!(!h.progress(0.0, 0.0, 0.0, 0.0));
        assert_eq!(h.write(b"data").unwrap(), 0);
    }

    #[derive(Default)]
    struct Progress(std::sync::Mutex<Vec<u64>>);

    impl TransferListener for Progress {
        fn transfer_progressed(&self, transferred: u64) {
            self.0.lock().unwrap().push(transferred);
        }
    }

    #[test]
    fn upload_progress_stays_monotonic_across_rewind() {
        let progress = Arc::new(Progress::default());
        let listener: Arc<dyn TransferListener> = progress.clone();
        let mut h = TransferHandler::new();
        let body: Box<dyn UploadReader> = Box::new(std::io::Cursor::new(vec![1u8; 8]));
        h.begin(&CancelToken::new(), &listener, BodyTarget::Discard, Some(body));

        let mut buf = [0u8; 4];
        assert_eq!(h.read(&mut buf).unwrap(), 4);
        assert!(matches!(h.seek(SeekFrom::Start(0)), SeekResult::Ok));
        assert_eq!(h.read(&mut buf).unwrap(), 4);
        assert_eq!(h.read(&mut buf).unwrap(), 4);
        assert_eq!(h.read(&mut buf).unwrap(), 0);
        assert_eq!(*progress.0.lock().unwrap(), vec![4, 8]);
    }

    #[test]
    fn partial_token_requires_identity() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalSink::create(&dir.path().join("p.bin")).unwrap();
        let mut d = Download::new(sink, None, None);
        d.accepted = Some(Accepted {
            base: 0,
            expected: Some(10),
            validators: Validators {
                length: Some(10),
                ..Validators::default()
            },
        });
        d.written = 4;
        assert!(d.partial_token().is_none());
        d.accepted.as_mut().unwrap().validators.etag = Some("\"x\"".into());
        assert_eq!(d.partial_token().unwrap().offset, 4);
    }

    #[test]
    fn retained_token_survives_until_restart() {
        let dir = tempfile::tempdir().unwrap();
        let sink = partial_file(&dir, b"abcd", 4);
        let token = ResumeToken::new(4, validators("\"v1\"", 8));
        let mut h = handler_with(BodyTarget::Download(Download::new(sink, Some(token.clone()), None)));
        assert!(feed(&mut h, &["HTTP/1.1 503 Service Unavailable"]));
        assert_eq!(h.take_download().unwrap().retained_token(), Some(token.clone()));

        let dir = tempfile::tempdir().unwrap();
        let sink = partial_file(&dir, b"abcd", 4);
        let mut h = handler_with(BodyTarget::Download(Download::new(sink, Some(token), None)));
        assert!(feed(&mut h, &["HTTP/1.1 200 OK", "Content-Length: 8", "ETag: \"v2\""]));
        assert_eq!(h.write(b"ne").unwrap(), 2);
        let kept = h.take_download().unwrap().retained_token().unwrap();
        assert_eq!(kept.offset, 2);
        assert_eq!(kept.validators.etag.as_deref(), Some("\"v2\""));
    }
}
