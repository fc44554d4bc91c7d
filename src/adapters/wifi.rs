//! Wireless adapter.
//!
//! Implements [`WifiPort`]: station joins for normal operation and the
//! local access point for setup mode.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi`.  `begin_join`
//!   only issues `esp_wifi_connect()`; the association is observed by the
//!   caller polling [`WifiPort::is_link_up`].
//! - **all other targets**: a scripted radio.  Tests decide after how many
//!   polls a join succeeds, drop the link, or make the AP fail.

use log::info;

use crate::app::ports::WifiPort;
use crate::config::AccessPointConfig;
use crate::error::ConnectivityError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
};

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(target_os = "espidf")]
    ap_netif_configured: bool,

    #[cfg(not(target_os = "espidf"))]
    sim: SimRadio,
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    pub fn new(wifi: EspWifi<'static>) -> Self {
        Self {
            wifi,
            ap_netif_configured: false,
        }
    }

    fn auth_for(passphrase: &str) -> AuthMethod {
        if passphrase.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        }
    }

    /// Replace the default AP interface with one carrying `ap`'s addressing.
    fn configure_ap_netif(&mut self, ap: &AccessPointConfig) -> Result<(), ConnectivityError> {
        use esp_idf_svc::ipv4::{self, Ipv4Addr, Mask, RouterConfiguration, Subnet};
        use esp_idf_svc::netif::{EspNetif, NetifConfiguration};

        let [a, b, c, d] = ap.gateway;
        let conf = NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Router(RouterConfiguration {
                subnet: Subnet {
                    gateway: Ipv4Addr::new(a, b, c, d),
                    mask: Mask(ap.prefix_len()),
                },
                dhcp_enabled: true,
                dns: None,
                secondary_dns: None,
            })),
            ..NetifConfiguration::wifi_default_router()
        };
        let netif = EspNetif::new_with_conf(&conf).map_err(|_| ConnectivityError::RadioFailed)?;
        self.wifi
            .swap_netif_ap(netif)
            .map_err(|_| ConnectivityError::RadioFailed)?;
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
impl WifiPort for WifiAdapter {
    fn begin_join(&mut self, ssid: &str, passphrase: &str) -> Result<(), ConnectivityError> {
        let config = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: passphrase
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassphrase)?,
            auth_method: Self::auth_for(passphrase),
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Client(config))
            .map_err(|_| ConnectivityError::RadioFailed)?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|_| ConnectivityError::RadioFailed)?;
        }
        self.wifi.connect().map_err(|_| ConnectivityError::RadioFailed)?;
        info!("WiFi(espidf): association requested");
        Ok(())
    }

    fn is_link_up(&mut self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.is_up().unwrap_or(false)
    }

    fn disconnect(&mut self) {
        let _ = self.wifi.disconnect();
    }

    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), ConnectivityError> {
        if self.wifi.is_started().unwrap_or(false) {
            let _ = self.wifi.stop();
        }
        if !self.ap_netif_configured {
            self.configure_ap_netif(ap)?;
            self.ap_netif_configured = true;
        }
        let config = AccessPointConfiguration {
            ssid: ap.ssid.as_str().try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: ap
                .passphrase
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassphrase)?,
            auth_method: Self::auth_for(&ap.passphrase),
            channel: ap.channel,
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::AccessPoint(config))
            .map_err(|_| ConnectivityError::RadioFailed)?;
        self.wifi.start().map_err(|_| ConnectivityError::RadioFailed)?;
        Ok(())
    }

    fn rssi(&self) -> Option<i8> {
        let mut info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: `info` is a valid out-pointer for the duration of the call.
        let rc = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut info) };
        (rc == esp_idf_svc::sys::ESP_OK).then_some(info.rssi)
    }

    fn ip_address(&self) -> Option<[u8; 4]> {
        let info = self.wifi.sta_netif().get_ip_info().ok()?;
        let octets = info.ip.octets();
        (octets != [0, 0, 0, 0]).then_some(octets)
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
struct SimRadio {
    /// `Some(n)`: a join comes up on the `n`-th link poll.  `None`: never.
    join_after_polls: Option<u32>,
    polls: u32,
    joining: bool,
    link_up: bool,
    ap_fails: bool,
    access_point: Option<AccessPointConfig>,
    joins: Vec<String>,
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    /// A radio whose joins come up on the first poll.
    pub fn new() -> Self {
        Self {
            sim: SimRadio {
                join_after_polls: Some(1),
                ..Default::default()
            },
        }
    }

    /// `Some(n)`: later joins succeed on the `n`-th poll.  `None`: they never do.
    pub fn sim_join_after(&mut self, polls: Option<u32>) {
        self.sim.join_after_polls = polls;
    }

    /// Drop an established link.
    pub fn sim_drop_link(&mut self) {
        self.sim.link_up = false;
        self.sim.joining = false;
    }

    pub fn sim_fail_access_point(&mut self, fail: bool) {
        self.sim.ap_fails = fail;
    }

    /// The AP configuration last started, if any.
    pub fn sim_access_point(&self) -> Option<&AccessPointConfig> {
        self.sim.access_point.as_ref()
    }

    /// SSIDs of every join requested so far.
    pub fn sim_joins(&self) -> &[String] {
        &self.sim.joins
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiPort for WifiAdapter {
    fn begin_join(&mut self, ssid: &str, _passphrase: &str) -> Result<(), ConnectivityError> {
        self.sim.joins.push(ssid.to_string());
        self.sim.access_point = None;
        self.sim.link_up = false;
        self.sim.joining = true;
        self.sim.polls = 0;
        info!("WiFi(sim): joining '{}'", ssid);
        Ok(())
    }

    fn is_link_up(&mut self) -> bool {
        if self.sim.joining {
            self.sim.polls += 1;
            if self.sim.join_after_polls.is_some_and(|n| self.sim.polls >= n) {
                self.sim.joining = false;
                self.sim.link_up = true;
            }
        }
        self.sim.link_up
    }

    fn disconnect(&mut self) {
        self.sim.joining = false;
        self.sim.link_up = false;
    }

    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), ConnectivityError> {
        if self.sim.ap_fails {
            return Err(ConnectivityError::RadioFailed);
        }
        self.disconnect();
        self.sim.access_point = Some(ap.clone());
        Ok(())
    }

    fn rssi(&self) -> Option<i8> {
        self.sim.link_up.then_some(-58)
    }

    fn ip_address(&self) -> Option<[u8; 4]> {
        self.sim.link_up.then_some([192, 168, 31, 77])
    }
}
