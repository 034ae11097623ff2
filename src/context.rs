//! Per-request context and handler replies.
//!
//! The context is threaded explicitly through rate limiting, middleware and
//! dispatch; nothing reads ambient request state.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

use serde_json::Value;

use crate::routing::{normalize_path, PathParams};

/// Header carrying an API key.
pub const X_API_KEY: &str = "x-api-key";

/// Inbound request data the router needs.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Uppercase method as received.
    pub method: String,
    /// Normalized path, query stripped.
    pub path: String,
    pub query: HashMap<String, String>,
    /// Body parameters (form or JSON object fields).
    pub body: HashMap<String, Value>,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub client_ip: Option<IpAddr>,
    pub request_id: Option<String>,
    /// Set only by authentication middleware, never from request headers.
    pub user_id: Option<String>,
    /// Filled in by the router after a successful match.
    pub params: PathParams,
    /// Free-form values middleware hands to later layers.
    pub attributes: HashMap<String, Value>,
}

impl RequestContext {
    /// Build a context from a method and a raw URI (query is parsed, then stripped).
    pub fn new(method: impl AsRef<str>, uri: &str) -> Self {
        let query = uri
            .split_once('?')
            .map(|(_, q)| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            method: method.as_ref().to_ascii_uppercase(),
            path: normalize_path(uri),
            query,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    pub fn with_body_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.body.insert(name.into(), value);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Authenticated user, if middleware established one.
    pub fn user_identity(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// API key from the `X-Api-Key` header, else the `api_key` query parameter.
    pub fn api_key(&self) -> Option<&str> {
        self.header(X_API_KEY)
            .or_else(|| self.query.get("api_key").map(String::as_str))
    }

    /// Query parameter first, then body parameter.
    pub fn input(&self, name: &str) -> Option<Value> {
        self.query
            .get(name)
            .map(|v| Value::String(v.clone()))
            .or_else(|| self.body.get(name).cloned())
    }
}

/// Result of a handler or a short-circuiting middleware.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl Reply {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    pub fn text(status: u16, text: impl Into<String>) -> Self {
        Self::new(status, Value::String(text.into()))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.headers.insert(name.into(), value.to_string());
        self
    }
}

impl Default for Reply {
    fn default() -> Self {
        Self::new(204, Value::Null)
    }
}
