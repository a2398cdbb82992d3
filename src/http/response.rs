//! HTTP/1.1 response head parsing.
//!
//! Header names are lowercased on the way in so lookups are
//! case-insensitive; values keep their original bytes.

use indexmap::IndexMap;

use crate::error::{Error, Result};

#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: IndexMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length")?.trim().parse().ok()
    }

    /// Byte offset one past the blank line terminating the header block,
    /// or `None` while the block is still incomplete.
    pub fn find_header_end(bytes: &[u8]) -> Option<usize> {
        bytes.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
    }

    /// Parses the status line and header block (everything before the
    /// blank line). The body is filled in by the caller.
    pub fn parse_head(head: &[u8]) -> Result<HttpResponse> {
        let text = std::str::from_utf8(head).map_err(|_| {
            Error::protocol()
                .protocol_violation()
                .message("response head is not valid UTF-8")
                .build()
        })?;

        let mut lines = text.split("\r\n");
        let status_line = lines.next().unwrap_or("");

        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or("");
        if !version.starts_with("HTTP/") {
            return Err(Error::protocol()
                .protocol_violation()
                .message("malformed status line")
                .context(status_line.to_owned())
                .build());
        }

        let status = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(|| {
                Error::protocol()
                    .protocol_violation()
                    .message("malformed status code")
                    .context(status_line.to_owned())
                    .build()
            })?;
        let reason = parts.next().unwrap_or("").to_owned();

        let mut headers = IndexMap::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let Some((name, value)) = line.split_once(':') else {
                return Err(Error::protocol()
                    .protocol_violation()
                    .message("malformed header line")
                    .context(line.to_owned())
                    .build());
            };
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
        }

        Ok(HttpResponse {
            status,
            reason,
            headers,
            body: Vec::new(),
        })
    }
}
