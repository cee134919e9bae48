//! Acquisition and session control for an HLK-LD2410 presence radar.
//!
//! [`Monitor`] owns the link, the status console, the clock and the [`SessionState`].
//! [`Monitor::setup`] runs once; after that every [`Monitor::cycle`] drains the radar,
//! answers at most one inbound command, and runs the time-gated status reporter and
//! configuration retry. Nothing in a cycle blocks; only setup sleeps. A cycle never fails:
//! link and console errors are logged and the next cycle tries again.

use std::io;

use hlk_ld2410::Ld2410;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use clock::{Clock, SystemClock};
use config::{ConfigError, MonitorConfig, Timing};
use console::{Console, SerialConsole, StdioConsole};
use link::SensorLink;
use session::SessionState;
use setup::SetupOutcome;
use status::StatusReporter;

pub mod clock;
pub mod command;
pub mod config;
pub mod config_retry;
pub mod console;
pub mod link;
pub mod mock;
pub mod poll;
pub mod policy;
pub mod report;
pub mod session;
pub mod setup;
pub mod status;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("radar driver error: {0}")]
    Driver(#[from] hlk_ld2410::Error),
    #[error("serial-port error: {0}")]
    SerialPort(#[from] serialport::Error),
    #[error("console I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("control loop task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub struct Monitor<L, C, K> {
    link: L,
    console: C,
    clock: K,
    timing: Timing,
    session: SessionState,
    status: StatusReporter,
    console_errors: u32,
}

impl<L, C, K> Monitor<L, C, K>
where
    L: SensorLink,
    C: Console,
    K: Clock,
{
    pub fn new(link: L, console: C, clock: K, timing: Timing) -> Self {
        Self {
            link,
            console,
            clock,
            timing,
            session: SessionState::new(),
            status: StatusReporter::new(),
            console_errors: 0,
        }
    }

    pub fn setup(&mut self) -> io::Result<SetupOutcome> {
        setup::run_setup(
            &mut self.link,
            &mut self.console,
            &self.clock,
            &mut self.session,
            &self.timing,
        )
    }

    /// One pass of the control loop. Link failures end up in the session state, console
    /// failures in the log; either way the lines of this pass are lost and the next pass
    /// runs normally.
    pub fn cycle(&mut self) {
        poll::drain(&mut self.link, self.timing.max_polls_per_cycle);
        self.session.connected = self.link.is_connected();

        let served = command::service_commands(&self.link, &mut self.console);
        self.track_console(served.map(|command| command.is_some()));

        let now = self.clock.now_ms();
        let reported =
            self.status.report(&self.link, &mut self.console, now, &mut self.session, &self.timing);
        self.track_console(reported.map(|line| line.is_some()));

        let retried = config_retry::retry_configuration(
            &mut self.link,
            &mut self.console,
            &self.clock,
            &mut self.session,
            &self.timing,
        );
        self.track_console(retried);
    }

    /// `result` is `Ok(true)` when the step wrote to the console. Warn on the first
    /// failure of a run of failures, then stay quiet until a write goes through.
    fn track_console(&mut self, result: io::Result<bool>) {
        match result {
            Ok(true) if self.console_errors > 0 => {
                info!(failures = self.console_errors, "Console recovered.");
                self.console_errors = 0;
            }
            Ok(_) => {}
            Err(e) => {
                if self.console_errors == 0 {
                    warn!("Console I/O failed: {e}");
                } else {
                    debug!("Console I/O failed again: {e}");
                }
                self.console_errors += 1;
            }
        }
    }

    /// Console failures since the console last worked.
    pub fn console_errors(&self) -> u32 {
        self.console_errors
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }
}

/// Run the monitor until Ctrl-C.
///
/// The control loop is single-threaded and blocking, so it runs on a blocking task and
/// checks the cancellation token between cycles.
pub async fn presence_monitor(config: MonitorConfig) -> Result<(), MonitorError> {
    let cancel = CancellationToken::new();
    let cycle_cancel = cancel.clone();

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {e}");
            return;
        }
        info!("Shutdown signal received.");
        cancel.cancel();
    });

    tokio::task::spawn_blocking(move || run_control_loop(&config, &cycle_cancel)).await??;

    info!("Monitor stopped.");
    Ok(())
}

#[tracing::instrument(skip_all, fields(radar = %config.radar_port))]
fn run_control_loop(
    config: &MonitorConfig,
    cancel: &CancellationToken,
) -> Result<(), MonitorError> {
    let radar = Ld2410::open(&config.radar_port, config.radar_baud)?;
    let mut console: Box<dyn Console> = match &config.monitor_port {
        Some(port) => Box::new(SerialConsole::open(port, config.monitor_baud)?),
        None => Box::new(StdioConsole::spawn()),
    };
    report::write_lines(&mut console, &report::banner(&config.radar_port, config.radar_baud))?;

    let mut monitor = Monitor::new(radar, console, SystemClock::new(), config.timing.clone());
    let outcome = monitor.setup()?;
    info!(?outcome, "Setup finished.");

    while !cancel.is_cancelled() {
        monitor.cycle();
        monitor.clock().sleep_ms(config.timing.cycle_pause_ms);
    }
    Ok(())
}
