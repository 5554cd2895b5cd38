//! HTTP transport
//!
//! Blocking reqwest client behind the [`XhrFn`] collaborator. It runs on
//! the script host's blocking pool or the session caller, never on the
//! script thread.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hdom_js::{XhrFn, XhrRequest, XhrResponse};
use reqwest::blocking::Client;
use reqwest::Method;
use url::Url;

/// Build a transport resolving relative request targets against `origin`
pub fn http_transport(origin: Url, user_agent: &str, timeout: Duration) -> anyhow::Result<XhrFn> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .context("build HTTP client")?;
    Ok(Arc::new(move |request: XhrRequest| fetch(&client, &origin, request)))
}

fn fetch(client: &Client, origin: &Url, request: XhrRequest) -> anyhow::Result<XhrResponse> {
    let url = resolve(origin, &request)?;
    let method = Method::from_bytes(request.method.as_bytes())
        .with_context(|| format!("bad method {}", request.method))?;
    tracing::debug!("HTTP {} {}", method, url);

    let mut builder = client.request(method, url.clone());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }
    let response = builder.send().with_context(|| format!("fetch {url}"))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
        .collect();
    let body = response.text().context("read response body")?;
    Ok(XhrResponse { status, headers, body })
}

fn resolve(origin: &Url, request: &XhrRequest) -> anyhow::Result<Url> {
    request
        .absolute_url(origin)
        .with_context(|| format!("resolve {}", request.uri))
}
