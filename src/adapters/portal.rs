//! Captive setup portal and status page.
//!
//! The HTTP server runs handlers on its own thread.  Handlers never touch
//! domain state: a credential submission is parsed here and queued as
//! [`AppCommand::SubmitCredentials`] for the control loop, and `/status`
//! serialises a [`StatusSnapshot`] the loop refreshes behind a mutex.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /` | setup form |
//! | `POST /save` | 200 queued · 400 invalid form · 503 queue full |
//! | `GET /generate_204`, `/fwlink`, `/hotspot-detect.html`, `/canonical.html` | 302 → `/` |
//! | `GET /success.txt` | 200 `success` |
//! | `GET /status` | JSON [`StatusSnapshot`] |
//! | anything else | 302 → `/` |
//!
//! Form parsing and the status body are plain functions so they are
//! testable (and fuzzable) on the host.

use core::fmt;

use crate::app::commands::{AppCommand, Credentials};
use crate::app::service::StatusSnapshot;

/// Largest `POST /save` body accepted.
pub const MAX_FORM_LEN: usize = 1024;

/// Paths operating systems probe to detect a captive portal.
pub const CAPTIVE_PROBES: [&str; 4] = [
    "/generate_204",
    "/fwlink",
    "/hotspot-detect.html",
    "/canonical.html",
];

pub const SETUP_PAGE: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>Green Mesh setup</title></head>
<body><h2>Green Mesh setup</h2>
<form action="/save" method="POST">
<input type="text" name="ssid" placeholder="Wi-Fi name" required><br>
<input type="password" name="password" placeholder="Wi-Fi password" required><br>
<input type="text" name="customer_uid" placeholder="User ID" required><br>
<input type="text" name="device_number" placeholder="Device number" required><br>
<input type="submit" value="Save">
</form></body></html>"#;

pub const SAVED_PAGE: &str = "<html><body><h2>Saved</h2>\
<p>The controller restarts and joins your network.</p></body></html>";

pub const INVALID_PAGE: &str = "<html><body><h2>Error</h2>\
<p>All fields are required!</p><a href='/'>Go Back</a></body></html>";

// ───────────────────────────────────────────────────────────────
// Form parsing
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormError {
    /// A required field is absent or empty.
    MissingField(&'static str),
    /// A field does not fit its stored length.
    TooLong(&'static str),
    /// Bad percent-escape or non-UTF-8 text.
    Encoding,
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(name) => write!(f, "missing field '{name}'"),
            Self::TooLong(name) => write!(f, "field '{name}' too long"),
            Self::Encoding => write!(f, "invalid form encoding"),
        }
    }
}

/// Decode one `application/x-www-form-urlencoded` value.
fn url_decode<const N: usize>(raw: &[u8], field: &'static str) -> Result<heapless::String<N>, FormError> {
    fn hex(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    let mut bytes: heapless::Vec<u8, N> = heapless::Vec::new();
    let mut i = 0;
    while i < raw.len() {
        let b = match raw[i] {
            b'+' => b' ',
            b'%' => {
                let hi = raw.get(i + 1).copied().and_then(hex).ok_or(FormError::Encoding)?;
                let lo = raw.get(i + 2).copied().and_then(hex).ok_or(FormError::Encoding)?;
                i += 2;
                (hi << 4) | lo
            }
            other => other,
        };
        bytes.push(b).map_err(|_| FormError::TooLong(field))?;
        i += 1;
    }
    heapless::String::from_utf8(bytes).map_err(|_| FormError::Encoding)
}

/// Parse a `POST /save` body.  All four fields are required and must be
/// non-empty; unknown fields are ignored and a repeated field keeps its
/// last value.
pub fn parse_form(body: &[u8]) -> Result<Credentials, FormError> {
    let mut ssid = None;
    let mut passphrase = None;
    let mut account_id = None;
    let mut device_id = None;

    for pair in body.split(|&b| b == b'&').filter(|p| !p.is_empty()) {
        let (key, value) = match pair.iter().position(|&b| b == b'=') {
            Some(eq) => (&pair[..eq], &pair[eq + 1..]),
            None => (pair, &[][..]),
        };
        match key {
            b"ssid" => ssid = Some(url_decode(value, "ssid")?),
            b"password" => passphrase = Some(url_decode(value, "password")?),
            b"customer_uid" => account_id = Some(url_decode(value, "customer_uid")?),
            b"device_number" => device_id = Some(url_decode(value, "device_number")?),
            _ => {}
        }
    }

    fn required<const N: usize>(
        v: Option<heapless::String<N>>,
        name: &'static str,
    ) -> Result<heapless::String<N>, FormError> {
        v.filter(|s| !s.is_empty()).ok_or(FormError::MissingField(name))
    }

    Ok(Credentials {
        ssid: required(ssid, "ssid")?,
        passphrase: required(passphrase, "password")?,
        account_id: required(account_id, "customer_uid")?,
        device_id: required(device_id, "device_number")?,
    })
}

/// Parse a submission and queue it for the control loop.
pub fn submit_form(body: &[u8]) -> Result<bool, FormError> {
    let creds = parse_form(body)?;
    log::info!(
        "Portal: credentials for '{}' / device '{}' received",
        creds.ssid,
        creds.device_id
    );
    Ok(crate::events::push_command(AppCommand::SubmitCredentials(creds)))
}

/// JSON body of `GET /status`.
pub fn status_json(snapshot: &StatusSnapshot) -> Vec<u8> {
    serde_json::to_vec(snapshot).unwrap_or_else(|_| b"{}".to_vec())
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF HTTP server
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn start_portal(
    status: std::sync::Arc<std::sync::Mutex<StatusSnapshot>>,
) -> anyhow::Result<esp_idf_svc::http::server::EspHttpServer<'static>> {
    use embedded_svc::http::Method;
    use embedded_svc::io::{Read, Write};
    use esp_idf_svc::http::server::{Configuration, EspHttpServer};

    const NO_CACHE: (&str, &str) = ("Cache-Control", "no-cache, no-store, must-revalidate");

    let cfg = Configuration {
        stack_size: 10 * 1024,
        uri_match_wildcard: true,
        ..Default::default()
    };
    let mut server = EspHttpServer::new(&cfg)?;

    server.fn_handler("/", Method::Get, |req| -> anyhow::Result<()> {
        let headers = [("Content-Type", "text/html; charset=utf-8"), NO_CACHE];
        req.into_response(200, Some("OK"), &headers)?
            .write_all(SETUP_PAGE.as_bytes())?;
        Ok(())
    })?;

    server.fn_handler("/save", Method::Post, |mut req| -> anyhow::Result<()> {
        let mut body: heapless::Vec<u8, MAX_FORM_LEN> = heapless::Vec::new();
        let mut chunk = [0u8; 256];
        loop {
            let n = req.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            if body.extend_from_slice(&chunk[..n]).is_err() {
                req.into_status_response(413)?.write_all(b"form too large")?;
                return Ok(());
            }
        }
        let html = [("Content-Type", "text/html; charset=utf-8"), NO_CACHE];
        match submit_form(&body) {
            Ok(true) => req.into_response(200, Some("OK"), &html)?.write_all(SAVED_PAGE.as_bytes())?,
            Ok(false) => req.into_status_response(503)?.write_all(b"busy, try again")?,
            Err(e) => {
                log::warn!("Portal: submission rejected: {}", e);
                req.into_response(400, Some("Bad Request"), &html)?
                    .write_all(INVALID_PAGE.as_bytes())?;
            }
        }
        Ok(())
    })?;

    for path in CAPTIVE_PROBES {
        server.fn_handler(path, Method::Get, |req| -> anyhow::Result<()> {
            req.into_response(302, Some("Found"), &[("Location", "/")])?;
            Ok(())
        })?;
    }

    server.fn_handler("/success.txt", Method::Get, |req| -> anyhow::Result<()> {
        req.into_ok_response()?.write_all(b"success")?;
        Ok(())
    })?;

    server.fn_handler("/status", Method::Get, move |req| -> anyhow::Result<()> {
        let snapshot = status
            .lock()
            .map_err(|_| anyhow::anyhow!("status snapshot poisoned"))?
            .clone();
        req.into_response(200, Some("OK"), &[("Content-Type", "application/json")])?
            .write_all(&status_json(&snapshot))?;
        Ok(())
    })?;

    server.fn_handler("/*", Method::Get, |req| -> anyhow::Result<()> {
        req.into_response(302, Some("Found"), &[("Location", "/"), NO_CACHE])?;
        Ok(())
    })?;

    log::info!("Portal: HTTP server listening");
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_submission() {
        let creds = parse_form(
            b"ssid=Orchard+Net&password=p%40ss%21word&customer_uid=cust-7&device_number=GM-0042",
        )
        .unwrap();
        assert_eq!(creds.ssid.as_str(), "Orchard Net");
        assert_eq!(creds.passphrase.as_str(), "p@ss!word");
        assert_eq!(creds.account_id.as_str(), "cust-7");
        assert_eq!(creds.device_id.as_str(), "GM-0042");
    }

    #[test]
    fn any_missing_field_is_rejected() {
        let full = [
            "ssid=a",
            "password=password1",
            "customer_uid=c",
            "device_number=d",
        ];
        let names = ["ssid", "password", "customer_uid", "device_number"];
        for skip in 0..full.len() {
            let body: Vec<&str> = full
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, f)| *f)
                .collect();
            assert_eq!(
                parse_form(body.join("&").as_bytes()),
                Err(FormError::MissingField(names[skip]))
            );
        }
    }

    #[test]
    fn empty_field_counts_as_missing() {
        assert_eq!(
            parse_form(b"ssid=&password=password1&customer_uid=c&device_number=d"),
            Err(FormError::MissingField("ssid"))
        );
    }

    #[test]
    fn bad_escape_and_overlong_values_are_rejected() {
        assert_eq!(
            parse_form(b"ssid=a%2&password=password1&customer_uid=c&device_number=d"),
            Err(FormError::Encoding)
        );
        let long = format!("ssid={}&password=p&customer_uid=c&device_number=d", "x".repeat(33));
        assert_eq!(parse_form(long.as_bytes()), Err(FormError::TooLong("ssid")));
    }

    #[test]
    fn unknown_fields_ignored_and_last_value_wins() {
        let creds = parse_form(
            b"x=1&ssid=first&ssid=second&password=password1&customer_uid=c&device_number=d&submit=Save",
        )
        .unwrap();
        assert_eq!(creds.ssid.as_str(), "second");
    }

    #[test]
    fn status_body_has_every_field() {
        let snapshot = StatusSnapshot {
            device_number: crate::config::heapless_str("GM-1"),
            onboarded: true,
            heap_free: 1234,
            ..Default::default()
        };
        let v: serde_json::Value = serde_json::from_slice(&status_json(&snapshot)).unwrap();
        for key in [
            "device_number",
            "customer_uid",
            "ssid",
            "ip_address",
            "onboarded",
            "heap_free",
            "wifi_rssi",
        ] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        assert_eq!(v["device_number"], "GM-1");
        assert_eq!(v["ip_address"], serde_json::Value::Null);
    }
}
