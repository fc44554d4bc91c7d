//! HTTP client adapter.
//!
//! Implements [`HttpPort`].  On ESP-IDF each exchange opens a fresh
//! `EspHttpConnection` (TLS through the global certificate bundle) wrapped
//! in the `embedded_svc` blocking client; only the status code is kept.
//! On the host the adapter records every request and answers from a
//! per-URL script.

use crate::app::ports::HttpPort;
use crate::error::TransportError;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

/// One request seen by the simulated client.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimRequest {
    pub method: &'static str,
    pub url: String,
    pub body: Vec<u8>,
}

pub struct HttpAdapter {
    #[cfg(not(target_os = "espidf"))]
    responses: HashMap<String, Result<u16, TransportError>>,
    #[cfg(not(target_os = "espidf"))]
    fallback: Result<u16, TransportError>,
    #[cfg(not(target_os = "espidf"))]
    requests: Vec<SimRequest>,
}

impl Default for HttpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            responses: HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            fallback: Err(TransportError::Unreachable),
            #[cfg(not(target_os = "espidf"))]
            requests: Vec::new(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl HttpAdapter {
    fn exchange(
        &mut self,
        method: embedded_svc::http::Method,
        url: &str,
        body: Option<&[u8]>,
        timeout_ms: u32,
    ) -> Result<u16, TransportError> {
        use embedded_svc::http::client::Client;
        use embedded_svc::io::Write;
        use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

        let config = Configuration {
            timeout: Some(core::time::Duration::from_millis(u64::from(timeout_ms))),
            use_global_ca_store: true,
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let connection = EspHttpConnection::new(&config).map_err(|_| TransportError::Io)?;
        let mut client = Client::wrap(connection);

        let mut len_buf = heapless::String::<10>::new();
        let response = match body {
            Some(bytes) => {
                use core::fmt::Write as _;
                let _ = write!(len_buf, "{}", bytes.len());
                let headers = [
                    ("Content-Type", "application/json"),
                    ("Content-Length", len_buf.as_str()),
                ];
                let mut request = client
                    .request(method, url, &headers)
                    .map_err(|_| TransportError::Unreachable)?;
                request.write_all(bytes).map_err(|_| TransportError::Io)?;
                request.flush().map_err(|_| TransportError::Io)?;
                request.submit().map_err(|_| TransportError::Timeout)?
            }
            None => client
                .request(method, url, &[])
                .map_err(|_| TransportError::Unreachable)?
                .submit()
                .map_err(|_| TransportError::Timeout)?,
        };
        let status = response.status();
        log::debug!("HTTP(espidf): {} -> {}", url, status);
        Ok(status)
    }
}

#[cfg(target_os = "espidf")]
impl HttpPort for HttpAdapter {
    fn post_json(&mut self, url: &str, body: &[u8], timeout_ms: u32) -> Result<u16, TransportError> {
        self.exchange(embedded_svc::http::Method::Post, url, Some(body), timeout_ms)
    }

    fn get(&mut self, url: &str, timeout_ms: u32) -> Result<u16, TransportError> {
        self.exchange(embedded_svc::http::Method::Get, url, None, timeout_ms)
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl HttpAdapter {
    /// Answer requests to `url` with `result`.
    pub fn sim_respond(&mut self, url: &str, result: Result<u16, TransportError>) {
        self.responses.insert(url.to_string(), result);
    }

    /// Answer every unscripted URL with `result` (default: unreachable).
    pub fn sim_respond_all(&mut self, result: Result<u16, TransportError>) {
        self.fallback = result;
    }

    pub fn sim_requests(&self) -> &[SimRequest] {
        &self.requests
    }

    /// Bodies posted to `url`, in order.
    pub fn sim_bodies_for(&self, url: &str) -> Vec<&[u8]> {
        self.requests
            .iter()
            .filter(|r| r.url == url)
            .map(|r| r.body.as_slice())
            .collect()
    }

    fn answer(&mut self, method: &'static str, url: &str, body: &[u8]) -> Result<u16, TransportError> {
        self.requests.push(SimRequest {
            method,
            url: url.to_string(),
            body: body.to_vec(),
        });
        self.responses.get(url).copied().unwrap_or(self.fallback)
    }
}

#[cfg(not(target_os = "espidf"))]
impl HttpPort for HttpAdapter {
    fn post_json(&mut self, url: &str, body: &[u8], _timeout_ms: u32) -> Result<u16, TransportError> {
        self.answer("POST", url, body)
    }

    fn get(&mut self, url: &str, _timeout_ms: u32) -> Result<u16, TransportError> {
        self.answer("GET", url, &[])
    }
}
