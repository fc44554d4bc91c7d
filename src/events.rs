//! Command queue between the ESP-IDF service threads and the main loop.
//!
//! The setup portal runs its handlers on the HTTP server's own thread and
//! must never touch domain state.  It pushes an [`AppCommand`] into a
//! bounded `embassy-sync` channel; the main loop drains the channel once
//! per iteration and hands each command to the service.
//!
//! ```text
//! ┌──────────────┐ AppCommand ┌──────────────┐
//! │ HTTP handler │───────────▶│  Main Loop   │
//! │  (thread)    │  (bounded) │  (consumer)  │
//! └──────────────┘            └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::commands::AppCommand;

/// Maximum number of pending commands.
const COMMAND_QUEUE_CAP: usize = 4;

static COMMAND_CHANNEL: Channel<CriticalSectionRawMutex, AppCommand, COMMAND_QUEUE_CAP> =
    Channel::new();

/// Queue a command.  Returns `false` if the queue is full (command dropped).
pub fn push_command(cmd: AppCommand) -> bool {
    COMMAND_CHANNEL.try_send(cmd).is_ok()
}

/// Next pending command, if any.
pub fn pop_command() -> Option<AppCommand> {
    COMMAND_CHANNEL.try_receive().ok()
}

/// Drain all pending commands into a callback, in FIFO order.
pub fn drain_commands(mut handler: impl FnMut(AppCommand)) {
    while let Some(cmd) = pop_command() {
        handler(cmd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::commands::Credentials;
    use crate::config::heapless_str;

    fn submission(n: u8) -> AppCommand {
        let mut device_id = heapless_str::<64>("GM-");
        let _ = device_id.push(char::from(b'0' + n));
        AppCommand::SubmitCredentials(Credentials {
            ssid: heapless_str("orchard"),
            passphrase: heapless_str("password1"),
            account_id: heapless_str("cust-7"),
            device_id,
        })
    }

    // Single test: the queue is a process-wide static.
    #[test]
    fn queue_is_bounded_and_fifo() {
        drain_commands(|_| {});
        for n in 0..COMMAND_QUEUE_CAP as u8 {
            assert!(push_command(submission(n)));
        }
        assert!(!push_command(submission(9)));

        let mut seen = Vec::new();
        drain_commands(|cmd| seen.push(cmd));
        assert_eq!(seen.len(), COMMAND_QUEUE_CAP);
        assert_eq!(seen[0], submission(0));
        assert_eq!(seen[3], submission(3));
        assert_eq!(pop_command(), None);
    }
}
