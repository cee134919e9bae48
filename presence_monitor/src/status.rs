//! Rate-limited detection lines and disconnection notices.

use std::io;

use tracing::debug;

use crate::clock::interval_elapsed;
use crate::config::Timing;
use crate::console::Console;
use crate::link::SensorLink;
use crate::report::{gates_line, presence_line, DISCONNECTED_NOTICE};
use crate::session::SessionState;

/// Basic-mode lines between "engineering mode not enabled" debug reminders.
const BASELINE_REMINDER_EVERY: u32 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusLine {
    Detection,
    Disconnected,
}

#[derive(Debug, Default)]
pub struct StatusReporter {
    baseline_lines: u32,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both paths share `last_report_ms`, so a notice never follows a detection line
    /// (or the other way round) faster than the applicable interval.
    pub fn report<L, C>(
        &mut self,
        link: &L,
        console: &mut C,
        now_ms: u32,
        session: &mut SessionState,
        timing: &Timing,
    ) -> io::Result<Option<StatusLine>>
    where
        L: SensorLink,
        C: Console + ?Sized,
    {
        if !session.connected {
            if !interval_elapsed(now_ms, session.last_report_ms, timing.disconnected_notice_ms) {
                return Ok(None);
            }
            session.last_report_ms = now_ms;
            console.write_line(DISCONNECTED_NOTICE)?;
            return Ok(Some(StatusLine::Disconnected));
        }

        if !interval_elapsed(now_ms, session.last_report_ms, timing.report_interval_ms) {
            return Ok(None);
        }
        session.last_report_ms = now_ms;

        let reading = link.reading();
        console.write_line(&presence_line(reading))?;
        if session.engineering_mode() {
            console.write_line(&gates_line(reading))?;
        } else {
            self.baseline_lines += 1;
            if self.baseline_lines >= BASELINE_REMINDER_EVERY {
                debug!("Engineering mode not enabled");
                self.baseline_lines = 0;
            }
        }
        Ok(Some(StatusLine::Detection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{BufferConsole, MockLink};
    use hlk_ld2410::{Reading, TargetState};

    fn connected_session() -> SessionState {
        let mut session = SessionState::new();
        session.connected = true;
        session
    }

    #[test]
    fn detection_lines_are_rate_limited() {
        let link = MockLink::new();
        let mut console = BufferConsole::new();
        let mut session = connected_session();
        let mut reporter = StatusReporter::new();
        let timing = Timing::default();

        let mut fired = Vec::new();
        for now in (0..2_000).step_by(50) {
            if reporter.report(&link, &mut console, now, &mut session, &timing).unwrap().is_some() {
                fired.push(now);
            }
        }
        assert_eq!(fired, vec![550, 1_100, 1_650]);
    }

    #[test]
    fn engineering_mode_adds_gate_line() {
        let link = MockLink::new().with_reading(Reading {
            target: TargetState::None,
            ..Reading::default()
        });
        let mut console = BufferConsole::new();
        let mut session = connected_session();
        session.mark_engineering_mode();

        StatusReporter::new()
            .report(&link, &mut console, 501, &mut session, &Timing::default())
            .unwrap();
        assert_eq!(
            console.lines(),
            vec!["Presence: NO", "GATES_MOV:0,0,0,0,0,0,0,0,0 | GATES_STAT:0,0,0,0,0,0,0,0,0"]
        );
    }

    #[test]
    fn disconnected_notice_every_five_seconds() {
        let link = MockLink::new();
        let mut console = BufferConsole::new();
        let mut session = SessionState::new();
        let mut reporter = StatusReporter::new();
        let timing = Timing::default();

        let mut fired = Vec::new();
        for now in (0..16_000).step_by(100) {
            let fired_line = reporter.report(&link, &mut console, now, &mut session, &timing);
            if let Some(kind) = fired_line.unwrap() {
                assert_eq!(kind, StatusLine::Disconnected);
                fired.push(now);
            }
        }
        assert_eq!(fired, vec![5_100, 10_200, 15_300]);
        assert!(console.lines().iter().all(|l| *l == DISCONNECTED_NOTICE));
    }
}
