//! Parse HTTP response header lines into a ResponseHead.

use super::Validators;

/// `Content-Range: bytes start-end/total` (end inclusive; total may be `*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: Option<u64>,
}

/// Status and headers of the final response of a request.
#[derive(Debug, Clone, Default)]
pub struct ResponseHead {
    pub status: Option<u32>,
    /// Length of this response's body.
    pub content_length: Option<u64>,
    pub content_range: Option<ContentRange>,
    pub accept_ranges: bool,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub location: Option<String>,
    /// `DAV` header present (WebDAV compliance classes).
    pub dav: bool,
}

impl ResponseHead {
    /// Validator snapshot of the full entity. Length comes from `Content-Range`
    /// on partial responses and from `Content-Length` on 200.
    pub fn validators(&self) -> Validators {
        let length = match (self.status, self.content_range) {
            (Some(206), Some(range)) => range.total,
            (Some(206), None) => None,
            _ => self.content_length,
        };
        Validators {
            etag: self.etag.clone(),
            last_modified: self.last_modified.clone(),
            length,
        }
    }
}

/// Parse `bytes 400-999/1000`. Returns None for unsatisfied ranges (`bytes */1000`).
pub fn parse_content_range(value: &str) -> Option<ContentRange> {
    let value = value.trim();
    let rest = value
        .get(..6)
        .filter(|p| p.eq_ignore_ascii_case("bytes "))
        .map(|_| value[6..].trim())?;
    let (span, total) = rest.split_once('/')?;
    let (start, end) = span.split_once('-')?;
    let start = start.trim().parse::<u64>().ok()?;
    let end = end.trim().parse::<u64>().ok()?;
    if end < start {
        return None;
    }
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse::<u64>().ok()?),
    };
    Some(ContentRange { start, end, total })
}

fn parse_status_line(line: &str) -> Option<u32> {
    let mut parts = line.split_whitespace();
    let proto = parts.next()?;
    if !proto.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse::<u32>().ok()
}

/// Parse header lines of the *last* response in `lines`. Earlier blocks
/// (redirects, 100-continue, auth challenges) are skipped.
pub fn parse_response_head(lines: &[String]) -> ResponseHead {
    let start = lines
        .iter()
        .rposition(|l| l.starts_with("HTTP/"))
        .unwrap_or(0);
    let mut head = ResponseHead::default();

    for line in &lines[start..] {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            head.status = parse_status_line(line);
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            head.content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("content-range") {
            head.content_range = parse_content_range(value);
        } else if name.eq_ignore_ascii_case("accept-ranges") {
            head.accept_ranges = value.eq_ignore_ascii_case("bytes");
        } else if name.eq_ignore_ascii_case("etag") {
            head.etag = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("last-modified") {
            head.last_modified = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("location") {
            head.location = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("dav") {
            head.dav = !value.is_empty();
        }
    }
    head
}
