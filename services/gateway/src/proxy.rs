//! Forwarding of admitted requests to downstream services.
use crate::error::GatewayError;
use anyhow::Context;
use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;
use questline_common::observability;
use questline_trust::{ForwardedClaim, TRUST_HEADER, encode};
use std::collections::HashMap;
use std::time::Duration;

/// Headers that describe one connection and never travel past the gateway.
pub const HOP_HEADERS: [&str; 9] = [
    "host",
    "content-length",
    "connection",
    "transfer-encoding",
    "keep-alive",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
];

pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct Upstreams {
    client: reqwest::Client,
    services: HashMap<String, String>,
}

impl Upstreams {
    pub fn new(services: HashMap<String, String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build proxy client")?;
        let services = services
            .into_iter()
            .map(|(key, url)| (key, url.trim_end_matches('/').to_string()))
            .collect();
        Ok(Self { client, services })
    }

    pub fn base_url(&self, service: &str) -> Option<&str> {
        self.services.get(service).map(String::as_str)
    }

    /// Send the request to `base_url` + `path_and_query` and relay the answer.
    ///
    /// Downstream error statuses are relayed as they are; only transport
    /// failures become gateway errors.
    pub async fn forward(
        &self,
        base_url: &str,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
        claim: Option<&ForwardedClaim>,
    ) -> Result<Response, GatewayError> {
        let mut outbound = outbound_headers(headers);
        if let Some(claim) = claim {
            let token = encode(claim)
                .map_err(|err| GatewayError::Internal(format!("encode trust token: {err}")))?;
            let value = HeaderValue::from_str(&token)
                .map_err(|err| GatewayError::Internal(format!("trust header value: {err}")))?;
            outbound.insert(TRUST_HEADER, value);
        }
        observability::inject_trace_context(&mut outbound);

        let url = format!("{base_url}{path_and_query}");
        let response = self
            .client
            .request(method, &url)
            .headers(outbound)
            .body(body)
            .send()
            .await
            .map_err(|err| transport_error(&url, err))?;

        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| transport_error(&url, err))?;
        if !status.is_success() {
            tracing::debug!(%url, %status, "downstream returned error status");
        }

        let mut builder = Response::builder().status(status);
        if let Some(value) = content_type {
            builder = builder.header(CONTENT_TYPE, value);
        }
        builder
            .body(Body::from(bytes))
            .map_err(|err| GatewayError::Internal(format!("build response: {err}")))
    }
}

/// Copy of `headers` without hop-by-hop headers or a client-supplied trust
/// header.
pub fn outbound_headers(headers: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name_str = name.as_str();
        if HOP_HEADERS.contains(&name_str) || name_str == TRUST_HEADER {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }
    outbound
}

fn transport_error(url: &str, err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        tracing::warn!(%url, error = %err, "downstream timed out");
        GatewayError::UpstreamTimeout("downstream service timed out".to_string())
    } else {
        tracing::warn!(%url, error = %err, "downstream unreachable");
        GatewayError::UpstreamFailure("downstream service unavailable".to_string())
    }
}

pub fn status_label(status: StatusCode) -> &'static str {
    match status.as_u16() {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}
