//! The HTTP-transport collaborator, modeled at its contract only.
//!
//! The real HTTP server wiring lives outside this crate; callers construct
//! an [`HttpRequestContext`] from whatever framework they embed this engine
//! in and hand it to the pipeline.

use std::collections::HashMap;
use std::net::IpAddr;

/// Case-preserved, multi-valued header map.
///
/// Lookups are case-insensitive (headers are case-insensitive per RFC 7230)
/// but the original casing of each value is retained for inspection by
/// contributors that care (e.g. echoing back a malformed header name).
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value matching `name`, case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values matching `name`, case-insensitively, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Negotiated HTTP protocol token, as reported by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    Http1_0,
    Http1_1,
    Http2,
    Http3,
}

impl ProtocolVersion {
    #[must_use]
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Http1_0 => "HTTP/1.0",
            Self::Http1_1 => "HTTP/1.1",
            Self::Http2 => "HTTP/2",
            Self::Http3 => "HTTP/3",
        }
    }
}

/// Everything a contributor may read about one inbound HTTP request.
///
/// Mirrors the external-interface contract of the HTTP-transport
/// collaborator: method, path, query string, raw headers (case preserved),
/// negotiated protocol, remote address, and a stable request id.
#[derive(Debug, Clone)]
pub struct HttpRequestContext {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub query: String,
    pub protocol: ProtocolVersion,
    pub remote_addr: Option<IpAddr>,
    pub headers: HeaderMap,
}

impl HttpRequestContext {
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        protocol: ProtocolVersion,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            method: method.into(),
            path: path.into(),
            query: String::new(),
            protocol,
            remote_addr: None,
            headers: HeaderMap::new(),
        }
    }

    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get("user-agent")
    }

    /// The request path with any query string stripped, used by the policy
    /// registry's static-asset and path-pattern matching.
    #[must_use]
    pub fn path_without_query(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }

    /// Lowercased file extension of the path, if any — used by
    /// `UseFileExtensionStaticDetection`.
    #[must_use]
    pub fn path_extension(&self) -> Option<String> {
        let path = self.path_without_query();
        let name = path.rsplit('/').next().unwrap_or(path);
        name.rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    #[must_use]
    pub fn remote_addr_string(&self) -> Option<String> {
        self.remote_addr.map(|ip| ip.to_string())
    }
}
