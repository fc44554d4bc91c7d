//! Green Mesh Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareGpio   EspClock   NvsAdapter   WifiAdapter            │
//! │  HttpAdapter    MqttAdapter   SystemAdapter   LogEventSink     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · Store · Sensors · Backend · Control channel     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Portal (HTTP server thread) ──▶ command queue ──▶ main loop   │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::sntp::EspSntp;
use esp_idf_svc::wifi::EspWifi;

use greenmesh::adapters::hardware::HardwareGpio;
use greenmesh::adapters::http::HttpAdapter;
use greenmesh::adapters::log_sink::LogEventSink;
use greenmesh::adapters::mqtt::MqttAdapter;
use greenmesh::adapters::nvs::NvsAdapter;
use greenmesh::adapters::portal;
use greenmesh::adapters::system::SystemAdapter;
use greenmesh::adapters::time::EspClock;
use greenmesh::adapters::wifi::WifiAdapter;
use greenmesh::adapters::Board;
use greenmesh::app::ports::{ClockPort, PortSet};
use greenmesh::app::service::AppService;
use greenmesh::drivers::hw_init;
use greenmesh::events;
use greenmesh::storage::settings;

/// Control loop period.
const LOOP_PERIOD_MS: u32 = 20;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Green Mesh v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        error!("HAL init failed: {}", e);
        return Err(anyhow::anyhow!("peripheral init: {}", e));
    }
    if let Err(e) = hw_init::init_isr_service() {
        warn!("ISR service init failed ({}), flow sensors will read zero", e);
    }

    // ── 3. Storage and controller settings ────────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running without persistence", e);
            NvsAdapter::default()
        }
    };
    let config = settings::load_or_seed(&mut nvs);

    // ── 4. Radio and network services ─────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop, None)?;
    let _sntp = EspSntp::new_default()?;

    let ports = PortSet::<Board> {
        gpio: HardwareGpio::new(),
        clock: EspClock::new(),
        storage: nvs,
        wifi: WifiAdapter::new(esp_wifi),
        http: HttpAdapter::new(),
        mqtt: MqttAdapter::new(),
        system: SystemAdapter::new(),
    };

    // ── 5. Application service ────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut app = AppService::new(ports, config);
    app.start(&mut sink);

    let status = Arc::new(Mutex::new(app.status_snapshot()));
    let _portal = portal::start_portal(Arc::clone(&status))?;

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        events::drain_commands(|cmd| app.handle_command(cmd, &mut sink));
        app.tick(&mut sink);

        match status.lock() {
            Ok(mut snapshot) => *snapshot = app.status_snapshot(),
            Err(_) => warn!("Status snapshot lock poisoned"),
        }

        app.clock_mut().delay_ms(LOOP_PERIOD_MS);
    }
}
