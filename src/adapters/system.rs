//! System adapter: restart and heap statistics.
//!
//! On the host, a restart is only recorded so tests can assert on it.

use crate::app::ports::SystemPort;

pub struct SystemAdapter {
    #[cfg(not(target_os = "espidf"))]
    restarts: u32,
}

impl Default for SystemAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            restarts: 0,
        }
    }

    /// Number of restarts requested so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_restarts(&self) -> u32 {
        self.restarts
    }
}

#[cfg(target_os = "espidf")]
impl SystemPort for SystemAdapter {
    fn restart(&mut self) {
        log::warn!("System: restarting now");
        esp_idf_svc::hal::reset::restart();
    }

    fn free_heap(&self) -> u32 {
        // SAFETY: read-only heap statistics query.
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
    }
}

#[cfg(not(target_os = "espidf"))]
impl SystemPort for SystemAdapter {
    fn restart(&mut self) {
        self.restarts += 1;
        log::warn!("System(sim): restart #{} requested", self.restarts);
    }

    fn free_heap(&self) -> u32 {
        180 * 1024
    }
}
