//! One-shot startup sequence: link, configuration, engineering mode.
//!
//! Each step has its own failure policy. A failed connect ends setup and leaves the
//! session in disconnected reporting. A failed configuration read is left to
//! [`crate::config_retry`]. Engineering mode gets a bounded number of attempts and the
//! session falls back to basic reports if none succeeds.

use std::io;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Timing;
use crate::console::Console;
use crate::link::SensorLink;
use crate::report::{self, write_lines};
use crate::session::SessionState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupOutcome {
    LinkFailed,
    Ready { config_read: bool, engineering_mode: bool },
}

#[tracing::instrument(skip_all)]
pub fn run_setup<L, C, K>(
    link: &mut L,
    console: &mut C,
    clock: &K,
    session: &mut SessionState,
    timing: &Timing,
) -> io::Result<SetupOutcome>
where
    L: SensorLink,
    C: Console + ?Sized,
    K: Clock,
{
    if let Err(e) = link.connect() {
        warn!("Radar did not come up: {e}");
        console.write_line("Initializing LD2410 radar: FAILED - Check connections")?;
        return Ok(SetupOutcome::LinkFailed);
    }
    console.write_line("Initializing LD2410 radar: SUCCESS")?;
    if let Some(version) = link.firmware() {
        write_lines(console, &report::firmware_block(version))?;
    }

    console.write_line("")?;
    console.write_line("Requesting configuration...")?;
    match link.request_configuration() {
        Ok(()) => {
            console.write_line("Configuration read successfully")?;
            display_configuration(link, console, clock, session, timing)?;
        }
        Err(e) => {
            warn!("Configuration read failed, will retry: {e}");
            console.write_line("Failed to read configuration")?;
        }
    }

    console.write_line("")?;
    console.write_line("Enabling engineering mode...")?;
    clock.sleep_ms(timing.engineering_settle_ms);

    let attempts = timing.engineering_retry.attempts;
    let enabled = timing.engineering_retry.run(clock, |n| match link.request_engineering_mode() {
        Ok(()) => {
            console.write_line(&format!("Attempt {n}/{attempts}... SUCCESS"))?;
            Ok(true)
        }
        Err(e) => {
            debug!("Engineering mode attempt {n} failed: {e}");
            console.write_line(&format!("Attempt {n}/{attempts}... FAILED"))?;
            Ok::<_, io::Error>(false)
        }
    })?;

    if enabled {
        session.mark_engineering_mode();
        info!("Engineering mode enabled");
    } else {
        warn!("Engineering mode unavailable after {attempts} attempts");
        console.write_line("Engineering mode could not be enabled")?;
        console.write_line("Note: Some LD2410 variants may not support engineering mode")?;
        console.write_line("Continuing with basic detection mode...")?;
    }

    write_lines(console, &report::detection_header(timing.report_interval_ms))?;
    session.connected = link.is_connected();

    Ok(SetupOutcome::Ready {
        config_read: session.config_displayed(),
        engineering_mode: session.engineering_mode(),
    })
}

/// Report a freshly read configuration and mark it displayed. Shared with the retry guard.
pub(crate) fn display_configuration<L, C, K>(
    link: &L,
    console: &mut C,
    clock: &K,
    session: &mut SessionState,
    timing: &Timing,
) -> io::Result<()>
where
    L: SensorLink,
    C: Console + ?Sized,
    K: Clock,
{
    clock.sleep_ms(timing.config_settle_ms);
    write_lines(console, &report::configuration_block(link.configuration()))?;
    session.mark_config_displayed();
    info!("Sensor configuration displayed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{BufferConsole, MockClock, MockLink};

    fn setup(
        link: &mut MockLink,
        console: &mut BufferConsole,
        clock: &MockClock,
    ) -> (SetupOutcome, SessionState) {
        let mut session = SessionState::new();
        let outcome = run_setup(link, console, clock, &mut session, &Timing::default()).unwrap();
        (outcome, session)
    }

    #[test]
    fn failed_connect_stops_setup() {
        let clock = MockClock::new();
        let mut link = MockLink::new().failing_connect();
        let mut console = BufferConsole::new();
        let (outcome, session) = setup(&mut link, &mut console, &clock);

        assert_eq!(outcome, SetupOutcome::LinkFailed);
        assert_eq!(console.lines(), vec!["Initializing LD2410 radar: FAILED - Check connections"]);
        assert!(link.config_attempts().is_empty());
        assert_eq!(link.engineering_attempts(), 0);
        assert!(!session.config_displayed());
    }

    #[test]
    fn engineering_mode_on_third_attempt() {
        let clock = MockClock::new();
        let mut link = MockLink::new().with_engineering_results(&[false, false, true]);
        let mut console = BufferConsole::new();
        let (outcome, session) = setup(&mut link, &mut console, &clock);

        assert_eq!(outcome, SetupOutcome::Ready { config_read: true, engineering_mode: true });
        assert!(session.engineering_mode());
        assert_eq!(link.engineering_attempts(), 3);
        let lines = console.lines();
        assert!(lines.contains(&"Attempt 2/3... FAILED"));
        assert!(lines.contains(&"Attempt 3/3... SUCCESS"));
        // settle 500 + pre-engineering 1000 + two failed-attempt pauses
        assert_eq!(clock.now_ms(), 3_500);
    }

    #[test]
    fn failed_configuration_read_is_not_displayed() {
        let clock = MockClock::new();
        let mut link = MockLink::new().with_config_results(&[false]);
        let mut console = BufferConsole::new();
        let (outcome, session) = setup(&mut link, &mut console, &clock);

        assert_eq!(outcome, SetupOutcome::Ready { config_read: false, engineering_mode: true });
        assert!(!session.config_displayed());
        assert!(console.lines().contains(&"Failed to read configuration"));
        assert!(!console.lines().contains(&"SENSOR CONFIGURATION:"));
    }

    #[test]
    fn firmware_block_follows_connect() {
        let clock = MockClock::new();
        let mut link = MockLink::new().with_firmware(hlk_ld2410::FirmwareVersion {
            major: 2,
            minor: 4,
            bugfix: 0x2209_1516,
        });
        let mut console = BufferConsole::new();
        setup(&mut link, &mut console, &clock);

        let lines = console.lines();
        assert_eq!(lines[0], "Initializing LD2410 radar: SUCCESS");
        assert_eq!(lines[2], "FIRMWARE INFORMATION:");
        assert_eq!(lines[4], "Version: 2.4.22091516");
    }
}
