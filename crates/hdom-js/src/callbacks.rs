//! Collaborator callbacks
//!
//! Layout, computed style and HTTP are provided by the embedder. They may
//! be called from any thread and report failures with [`anyhow::Error`].

use std::fmt;
use std::sync::Arc;

use url::Url;

/// `Geom(path) -> "x1,y1,x2,y2"`
pub type GeomFn = Arc<dyn Fn(&str) -> anyhow::Result<String> + Send + Sync>;

/// `Query(path, kebab-case-property) -> value`
pub type QueryFn = Arc<dyn Fn(&str, &str) -> anyhow::Result<String> + Send + Sync>;

/// Performs one HTTP exchange
pub type XhrFn = Arc<dyn Fn(XhrRequest) -> anyhow::Result<XhrResponse> + Send + Sync>;

/// The embedder's collaborators. Missing ones make the dependent APIs
/// report errors (or zero geometry).
#[derive(Clone, Default)]
pub struct Callbacks {
    pub geom: Option<GeomFn>,
    pub query: Option<QueryFn>,
    pub xhr: Option<XhrFn>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("geom", &self.geom.is_some())
            .field("query", &self.query.is_some())
            .field("xhr", &self.xhr.is_some())
            .finish()
    }
}

/// An outbound request built by `XMLHttpRequest`, `fetch` or a
/// `<script src>` load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XhrRequest {
    pub method: String,
    /// Normalized request target: absolute, or rooted at `/`
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl XhrRequest {
    pub fn new(method: &str, uri: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            uri: normalize_uri(uri),
            headers: Vec::new(),
            body: None,
        }
    }

    /// The request target resolved against the page origin
    pub fn absolute_url(&self, base: &Url) -> Result<Url, url::ParseError> {
        base.join(&self.uri)
    }
}

/// `./a.js` and `a.js` become `/a.js`; absolute and rooted URIs are kept
pub fn normalize_uri(uri: &str) -> String {
    let uri = uri.trim();
    if uri.starts_with("http") || uri.starts_with("//") {
        return uri.to_string();
    }
    let uri = uri.trim_start_matches('.');
    if uri.starts_with('/') {
        uri.to_string()
    } else {
        format!("/{uri}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XhrResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl XhrResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Headers in `getAllResponseHeaders` form
    pub fn header_block(&self) -> String {
        self.headers
            .iter()
            .map(|(k, v)| format!("{k}: {v}\r\n"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_uri() {
        assert_eq!(normalize_uri("./js/app.js"), "/js/app.js");
        assert_eq!(normalize_uri("../api"), "/api");
        assert_eq!(normalize_uri("api/items"), "/api/items");
        assert_eq!(normalize_uri("/rooted"), "/rooted");
        assert_eq!(normalize_uri("https://cdn.example.org/x.js"), "https://cdn.example.org/x.js");
    }

    #[test]
    fn test_absolute_url() {
        let base = Url::parse("https://example.com/dir/page.html").unwrap();
        let req = XhrRequest::new("get", "data.json");
        assert_eq!(req.method, "GET");
        assert_eq!(req.absolute_url(&base).unwrap().as_str(), "https://example.com/data.json");
    }

    #[test]
    fn test_header_block() {
        let resp = XhrResponse {
            status: 200,
            headers: vec![("Content-Type".into(), "text/plain".into())],
            body: String::new(),
        };
        assert_eq!(resp.header_block(), "Content-Type: text/plain\r\n");
    }
}
