//! Connectivity manager.
//!
//! Joins the stored wireless network, hosts the setup access point when
//! there is nothing to join, and probes whether the internet is reachable.
//!
//! ## Join sub-state
//!
//! A join is a polled sub-state rather than a blocking loop:
//!
//! ```text
//!   Disconnected ──begin_join──▶ Connecting{attempt, next_poll_ms}
//!        ▲                          │ link up        │ attempts exhausted
//!        │ link lost                ▼                ▼
//!        └──────────────────── Connected           Failed
//! ```
//!
//! [`ConnectivityManager::poll`] is called once per loop tick and only
//! touches the radio when the next poll is due, so the control loop keeps
//! servicing the reset button while a join is in flight.  Test builds also
//! get a blocking `join` over the same logic.

use log::{info, warn};

#[cfg(test)]
use crate::app::ports::ClockPort;
use crate::app::ports::{HttpPort, WifiPort};
use crate::config::{AccessPointConfig, ControllerConfig};
use crate::error::ConnectivityError;

// ───────────────────────────────────────────────────────────────
// Link state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting { attempt: u32, next_poll_ms: u64 },
    Connected,
    Failed,
}

/// Result of the blocking [`ConnectivityManager::join`].
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Connected,
    Failed,
}

/// Transitions reported by [`ConnectivityManager::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Joined,
    JoinFailed,
    Lost,
}

// ───────────────────────────────────────────────────────────────
// Credential validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// 1–32 printable ASCII bytes.
pub fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

/// Empty for an open network, otherwise 8–64 bytes.
pub fn validate_passphrase(passphrase: &str) -> Result<(), ConnectivityError> {
    if passphrase.is_empty() {
        return Ok(());
    }
    if passphrase.len() < 8 || passphrase.len() > 64 {
        return Err(ConnectivityError::InvalidPassphrase);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// ConnectivityManager
// ───────────────────────────────────────────────────────────────

pub struct ConnectivityManager {
    state: LinkState,
    poll_interval_ms: u32,
    max_attempts: u32,
    access_point: AccessPointConfig,
    ap_active: bool,
    probe_url: heapless::String<128>,
    probe_expected_status: u16,
    timeout_ms: u32,
}

impl ConnectivityManager {
    pub fn new(cfg: &ControllerConfig) -> Self {
        Self {
            state: LinkState::Disconnected,
            poll_interval_ms: cfg.join_poll_interval_ms,
            max_attempts: cfg.join_retry_count,
            access_point: cfg.access_point.clone(),
            ap_active: false,
            probe_url: cfg.probe_url.clone(),
            probe_expected_status: cfg.probe_expected_status,
            timeout_ms: cfg.http_timeout_ms,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub fn is_access_point_active(&self) -> bool {
        self.ap_active
    }

    /// Issue a client-mode join and enter the `Connecting` sub-state.
    pub fn begin_join(
        &mut self,
        wifi: &mut impl WifiPort,
        ssid: &str,
        passphrase: &str,
        now_ms: u64,
    ) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_passphrase(passphrase)?;

        info!("Connectivity: joining '{}'", ssid);
        if let Err(e) = wifi.begin_join(ssid, passphrase) {
            warn!("Connectivity: join request rejected: {}", e);
            self.state = LinkState::Failed;
            return Err(e);
        }
        self.state = LinkState::Connecting {
            attempt: 0,
            next_poll_ms: now_ms + u64::from(self.poll_interval_ms),
        };
        Ok(())
    }

    /// Advance the link state.  Returns an event only on a transition.
    pub fn poll(&mut self, wifi: &mut impl WifiPort, now_ms: u64) -> Option<LinkEvent> {
        match self.state {
            LinkState::Connecting {
                attempt,
                next_poll_ms,
            } => {
                if now_ms < next_poll_ms {
                    return None;
                }
                let attempt = attempt + 1;
                if wifi.is_link_up() {
                    self.state = LinkState::Connected;
                    info!("Connectivity: joined after {} poll(s), RSSI={:?}", attempt, wifi.rssi());
                    return Some(LinkEvent::Joined);
                }
                if attempt >= self.max_attempts {
                    warn!("Connectivity: join failed after {} poll(s)", attempt);
                    wifi.disconnect();
                    self.state = LinkState::Failed;
                    return Some(LinkEvent::JoinFailed);
                }
                self.state = LinkState::Connecting {
                    attempt,
                    next_poll_ms: now_ms + u64::from(self.poll_interval_ms),
                };
                None
            }
            LinkState::Connected => {
                if wifi.is_link_up() {
                    return None;
                }
                warn!("Connectivity: link lost");
                self.state = LinkState::Disconnected;
                Some(LinkEvent::Lost)
            }
            LinkState::Disconnected | LinkState::Failed => None,
        }
    }

    /// Blocking join: begin, then poll at the configured interval until
    /// the outcome is known.  The control loop drives
    /// [`begin_join`](Self::begin_join) and [`poll`](Self::poll) itself.
    #[cfg(test)]
    pub fn join(
        &mut self,
        wifi: &mut impl WifiPort,
        clock: &mut impl ClockPort,
        ssid: &str,
        passphrase: &str,
    ) -> JoinOutcome {
        if self.begin_join(wifi, ssid, passphrase, clock.now_ms()).is_err() {
            return JoinOutcome::Failed;
        }
        loop {
            clock.delay_ms(self.poll_interval_ms);
            match self.poll(wifi, clock.now_ms()) {
                Some(LinkEvent::Joined) => return JoinOutcome::Connected,
                Some(_) => return JoinOutcome::Failed,
                None if matches!(self.state, LinkState::Connecting { .. }) => {}
                None => return JoinOutcome::Failed,
            }
        }
    }

    pub fn disconnect(&mut self, wifi: &mut impl WifiPort) {
        wifi.disconnect();
        self.state = LinkState::Disconnected;
    }

    /// Bring up the local setup network.  Returns whether the radio
    /// accepted the configuration.
    pub fn start_access_point(&mut self, wifi: &mut impl WifiPort) -> bool {
        let ap = &self.access_point;
        match wifi.start_access_point(ap) {
            Ok(()) => {
                info!(
                    "Connectivity: access point '{}' up at {}.{}.{}.{}/{}",
                    ap.ssid,
                    ap.ip[0],
                    ap.ip[1],
                    ap.ip[2],
                    ap.ip[3],
                    ap.prefix_len()
                );
                self.ap_active = true;
                true
            }
            Err(e) => {
                warn!("Connectivity: access point failed: {}", e);
                self.ap_active = false;
                false
            }
        }
    }

    /// Reachability check: true only on the exact expected status.
    pub fn probe_internet(&self, http: &mut impl HttpPort) -> bool {
        match http.get(&self.probe_url, self.timeout_ms) {
            Ok(code) if code == self.probe_expected_status => {
                info!("Connectivity: internet reachable");
                true
            }
            Ok(code) => {
                warn!("Connectivity: probe returned {} (expected {})", code, self.probe_expected_status);
                false
            }
            Err(e) => {
                warn!("Connectivity: probe failed: {}", e);
                false
            }
        }
    }
}
