// http.rs

use std::{fmt, str::FromStr};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::*;

pub const CT_HTML: &str = "text/html; charset=utf-8";
pub const CT_JSON: &str = "application/json";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Patch,
}

impl FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            _ => bail!("unknown method {s:?}"),
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
}

impl Request {
    pub fn get(path: &str) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
        }
    }
}

/// Parse the request line out of a request head.
///
/// Headers and anything after them are ignored. The query string, if any, is
/// dropped from the path.
pub fn parse_request(head: &[u8]) -> anyhow::Result<Request> {
    let end = head
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(head.len());
    let line = std::str::from_utf8(&head[..end])?.trim_end_matches('\r');

    let mut parts = line.split_ascii_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        bail!("bad request line {line:?}");
    };
    let method: Method = method.parse()?;
    if !target.starts_with('/') {
        bail!("bad request target {target:?}");
    }
    let path = target.split(['?', '#']).next().unwrap_or(target);

    Ok(Request {
        method,
        path: path.into(),
    })
}

/// Length of the head up to and including the blank line, once it is complete.
pub fn head_len(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| p + 4)
        .or_else(|| buf.windows(2).position(|w| w == b"\n\n").map(|p| p + 2))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub reason: &'static str,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    pub fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            reason: "OK",
            content_type,
            body: body.into(),
        }
    }

    pub fn error(status: u16, reason: &'static str, msg: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            reason,
            content_type: CT_HTML,
            body: msg.into(),
        }
    }

    pub fn head(&self) -> String {
        format!(
            "HTTP/1.0 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
            self.status,
            self.reason,
            self.content_type,
            self.body.len()
        )
    }

    /// Write the whole response and flush.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, w: &mut W) -> anyhow::Result<()> {
        w.write_all(self.head().as_bytes()).await?;
        w.write_all(&self.body).await?;
        w.flush().await?;
        Ok(())
    }
}


// EOF
