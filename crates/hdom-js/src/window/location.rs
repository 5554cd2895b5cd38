//! Location API
//!
//! `window.location` and `document.URL`, derived from the session origin.
//! Assigning a new URL updates the parts but never navigates.

use url::Url;

/// Location state
#[derive(Debug, Clone)]
pub struct LocationManager {
    url: Url,
}

impl LocationManager {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    /// Full URL
    pub fn href(&self) -> String {
        self.url.to_string()
    }

    /// Set href, resolving relative URLs against the current one
    pub fn set_href(&mut self, href: &str) -> Result<(), url::ParseError> {
        self.url = self.url.join(href)?;
        tracing::debug!("location set to {}", self.url);
        Ok(())
    }

    /// Protocol (e.g., "https:")
    pub fn protocol(&self) -> String {
        format!("{}:", self.url.scheme())
    }

    /// Host (hostname:port)
    pub fn host(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{}", self.hostname(), port),
            None => self.hostname(),
        }
    }

    /// Hostname only
    pub fn hostname(&self) -> String {
        self.url.host_str().unwrap_or("").to_string()
    }

    pub fn port(&self) -> String {
        self.url.port().map(|p| p.to_string()).unwrap_or_default()
    }

    pub fn pathname(&self) -> String {
        self.url.path().to_string()
    }

    /// Query string including `?`, empty when there is none
    pub fn search(&self) -> String {
        self.url
            .query()
            .filter(|q| !q.is_empty())
            .map(|q| format!("?{q}"))
            .unwrap_or_default()
    }

    /// Fragment including `#`, empty when there is none
    pub fn hash(&self) -> String {
        self.url
            .fragment()
            .filter(|f| !f.is_empty())
            .map(|f| format!("#{f}"))
            .unwrap_or_default()
    }

    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// Named part, as read by the script-side `location` object
    pub fn part(&self, name: &str) -> Option<String> {
        Some(match name {
            "href" => self.href(),
            "protocol" => self.protocol(),
            "host" => self.host(),
            "hostname" => self.hostname(),
            "port" => self.port(),
            "pathname" => self.pathname(),
            "search" => self.search(),
            "hash" => self.hash(),
            "origin" => self.origin(),
            _ => return None,
        })
    }

    /// Resolve a URL against the current location
    pub fn resolve(&self, relative: &str) -> Option<Url> {
        self.url.join(relative).ok()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(s: &str) -> LocationManager {
        LocationManager::new(Url::parse(s).unwrap())
    }

    #[test]
    fn test_parts() {
        let loc = location("https://example.com:8443/a/b.html?q=1#top");
        assert_eq!(loc.protocol(), "https:");
        assert_eq!(loc.host(), "example.com:8443");
        assert_eq!(loc.hostname(), "example.com");
        assert_eq!(loc.port(), "8443");
        assert_eq!(loc.pathname(), "/a/b.html");
        assert_eq!(loc.search(), "?q=1");
        assert_eq!(loc.hash(), "#top");
        assert_eq!(loc.origin(), "https://example.com:8443");
        assert_eq!(loc.part("nope"), None);
    }

    #[test]
    fn test_set_href_is_relative() {
        let mut loc = location("https://example.com/dir/page.html");
        loc.set_href("other.html#x").unwrap();
        assert_eq!(loc.href(), "https://example.com/dir/other.html#x");
        assert_eq!(loc.search(), "");
    }
}
