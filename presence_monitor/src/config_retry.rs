//! Background re-read of the sensor configuration when setup could not get it.

use std::io;

use tracing::warn;

use crate::clock::Clock;
use crate::config::Timing;
use crate::console::Console;
use crate::link::SensorLink;
use crate::session::SessionState;
use crate::setup::display_configuration;

/// Try one configuration read if the link is up, nothing was displayed yet, and the
/// retry period has passed. Returns whether an attempt was made.
pub fn retry_configuration<L, C, K>(
    link: &mut L,
    console: &mut C,
    clock: &K,
    session: &mut SessionState,
    timing: &Timing,
) -> io::Result<bool>
where
    L: SensorLink,
    C: Console + ?Sized,
    K: Clock,
{
    if !session.connected || session.config_displayed() {
        return Ok(false);
    }
    let now = clock.now_ms();
    if !timing.config_retry.due(now, session.last_config_retry_ms) {
        return Ok(false);
    }
    session.last_config_retry_ms = now;

    console.write_line("")?;
    console.write_line("Retrying configuration read...")?;
    match link.request_configuration() {
        Ok(()) => display_configuration(link, console, clock, session, timing)?,
        Err(e) => warn!("Configuration retry failed: {e}"),
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{BufferConsole, MockClock, MockLink};

    fn retry(
        link: &mut MockLink,
        console: &mut BufferConsole,
        clock: &MockClock,
        session: &mut SessionState,
    ) -> bool {
        retry_configuration(link, console, clock, session, &Timing::default()).unwrap()
    }

    #[test]
    fn waits_for_the_full_period() {
        let clock = MockClock::new();
        let mut link = MockLink::new().with_clock(clock.clone()).with_config_results(&[false]);
        let mut console = BufferConsole::new();
        let mut session = SessionState::new();
        session.connected = true;

        clock.set(30_000);
        assert!(!retry(&mut link, &mut console, &clock, &mut session));
        clock.set(30_001);
        assert!(retry(&mut link, &mut console, &clock, &mut session));
        assert!(!session.config_displayed());
        clock.set(45_000);
        assert!(!retry(&mut link, &mut console, &clock, &mut session));
        assert_eq!(link.config_attempts(), &[30_001]);
    }

    #[test]
    fn skipped_while_disconnected() {
        let clock = MockClock::starting_at(100_000);
        let mut link = MockLink::new();
        let mut console = BufferConsole::new();
        let mut session = SessionState::new();

        assert!(!retry(&mut link, &mut console, &clock, &mut session));
        assert!(link.config_attempts().is_empty());
        assert!(console.lines().is_empty());
    }

    #[test]
    fn success_displays_once_and_stops() {
        let clock = MockClock::starting_at(40_000);
        let mut link = MockLink::new();
        let mut console = BufferConsole::new();
        let mut session = SessionState::new();
        session.connected = true;

        assert!(retry(&mut link, &mut console, &clock, &mut session));
        assert!(session.config_displayed());
        clock.advance(60_000);
        assert!(!retry(&mut link, &mut console, &clock, &mut session));
        assert_eq!(link.config_attempts().len(), 1);
        assert_eq!(console.lines().iter().filter(|l| **l == "SENSOR CONFIGURATION:").count(), 1);
    }
}
