//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements  | Connects to                         |
//! |------------|-------------|-------------------------------------|
//! | `hardware` | GpioPort    | ESP32 GPIO, ADC1                    |
//! | `time`     | ClockPort   | esp_timer, SNTP-set wall clock      |
//! | `nvs`      | StoragePort | NVS / in-memory store               |
//! | `wifi`     | WifiPort    | ESP-IDF WiFi STA + soft-AP          |
//! | `http`     | HttpPort    | ESP-IDF HTTP client (TLS bundle)    |
//! | `mqtt`     | MqttPort    | ESP-IDF MQTT client                 |
//! | `system`   | SystemPort  | esp_restart, heap statistics        |
//! | `log_sink` | EventSink   | Serial log output                   |
//! | `portal`   | (inbound)   | ESP-IDF HTTP server → command queue |
//!
//! Every adapter keeps one name on both targets; off-target builds swap
//! the hardware for a scripted simulation with `sim_*` hooks.

pub mod hardware;
pub mod http;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod portal;
pub mod system;
pub mod time;
pub mod wifi;

use crate::app::ports::Platform;

/// The board's adapter set.  Real peripherals on ESP-IDF, simulations
/// everywhere else.
pub struct Board;

impl Platform for Board {
    type Gpio = hardware::HardwareGpio;
    type Clock = time::EspClock;
    type Storage = nvs::NvsAdapter;
    type Wifi = wifi::WifiAdapter;
    type Http = http::HttpAdapter;
    type Mqtt = mqtt::MqttAdapter;
    type System = system::SystemAdapter;
}
