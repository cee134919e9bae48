//! Deterministic stand-ins for the radar, the clock, and the console.
//!
//! Used by the unit tests and the scenario tests under `tests/`. `MockClock` is a shared
//! handle: clones see the same time, so a `MockLink` or `BufferConsole` built with a clone
//! can timestamp what happens to it.

use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use hlk_ld2410::{Configuration, FirmwareVersion, Reading};

use crate::clock::Clock;
use crate::console::Console;
use crate::link::SensorLink;

#[derive(Clone, Debug, Default)]
pub struct MockClock {
    now: Rc<Cell<u32>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ms: u32) -> Self {
        let clock = Self::new();
        clock.set(ms);
        clock
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }

    /// Sleeping just moves time forward.
    fn sleep_ms(&self, ms: u32) {
        self.advance(ms);
    }
}

#[derive(Debug, thiserror::Error)]
#[error("mock link: {0}")]
pub struct MockLinkError(pub &'static str);

/// Scripted radar link.
///
/// Configuration and engineering-mode requests consume scripted results in order and
/// succeed once the script runs out.
#[derive(Debug)]
pub struct MockLink {
    connect_ok: bool,
    connected: bool,
    poll_fails: bool,
    pending_frames: u32,
    poll_calls: u32,
    config_script: VecDeque<bool>,
    engineering_script: VecDeque<bool>,
    config_attempts: Vec<u32>,
    engineering_attempts: u32,
    device_configuration: Configuration,
    configuration: Configuration,
    reading: Reading,
    firmware: Option<FirmwareVersion>,
    clock: Option<MockClock>,
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            connect_ok: true,
            connected: false,
            poll_fails: false,
            pending_frames: 0,
            poll_calls: 0,
            config_script: VecDeque::new(),
            engineering_script: VecDeque::new(),
            config_attempts: Vec::new(),
            engineering_attempts: 0,
            device_configuration: Configuration::default(),
            configuration: Configuration::default(),
            reading: Reading::default(),
            firmware: None,
            clock: None,
        }
    }

    pub fn failing_connect(mut self) -> Self {
        self.connect_ok = false;
        self
    }

    pub fn failing_poll(mut self) -> Self {
        self.poll_fails = true;
        self
    }

    pub fn with_pending_frames(mut self, frames: u32) -> Self {
        self.pending_frames = frames;
        self
    }

    pub fn with_config_results(mut self, results: &[bool]) -> Self {
        self.config_script = results.iter().copied().collect();
        self
    }

    pub fn with_engineering_results(mut self, results: &[bool]) -> Self {
        self.engineering_script = results.iter().copied().collect();
        self
    }

    /// Values the next successful configuration request will return.
    pub fn with_configuration(mut self, configuration: Configuration) -> Self {
        self.device_configuration = configuration;
        self
    }

    pub fn with_reading(mut self, reading: Reading) -> Self {
        self.reading = reading;
        self
    }

    pub fn with_firmware(mut self, firmware: FirmwareVersion) -> Self {
        self.firmware = Some(firmware);
        self
    }

    /// Timestamp configuration attempts with `clock`.
    pub fn with_clock(mut self, clock: MockClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Simulate the radar dropping off or coming back.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn queue_frames(&mut self, frames: u32) {
        self.pending_frames += frames;
    }

    pub fn poll_calls(&self) -> u32 {
        self.poll_calls
    }

    /// Clock time of every configuration request.
    pub fn config_attempts(&self) -> &[u32] {
        &self.config_attempts
    }

    pub fn engineering_attempts(&self) -> u32 {
        self.engineering_attempts
    }
}

impl SensorLink for MockLink {
    type Error = MockLinkError;

    fn connect(&mut self) -> Result<(), Self::Error> {
        if !self.connect_ok {
            return Err(MockLinkError("no frames"));
        }
        self.connected = true;
        Ok(())
    }

    fn poll(&mut self) -> Result<bool, Self::Error> {
        self.poll_calls += 1;
        if self.poll_fails {
            return Err(MockLinkError("read failed"));
        }
        if self.pending_frames == 0 {
            return Ok(false);
        }
        self.pending_frames -= 1;
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn request_configuration(&mut self) -> Result<(), Self::Error> {
        let at = self.clock.as_ref().map_or(0, |clock| clock.now_ms());
        self.config_attempts.push(at);
        if !self.config_script.pop_front().unwrap_or(true) {
            return Err(MockLinkError("no parameters ACK"));
        }
        self.configuration = self.device_configuration;
        Ok(())
    }

    fn request_engineering_mode(&mut self) -> Result<(), Self::Error> {
        self.engineering_attempts += 1;
        if self.engineering_script.pop_front().unwrap_or(true) {
            Ok(())
        } else {
            Err(MockLinkError("engineering mode rejected"))
        }
    }

    fn reading(&self) -> &Reading {
        &self.reading
    }

    fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    fn firmware(&self) -> Option<FirmwareVersion> {
        self.firmware
    }
}

/// In-memory console. Written lines are kept with the clock time they were written at.
#[derive(Debug, Default)]
pub struct BufferConsole {
    inbound: VecDeque<String>,
    written: Vec<(u32, String)>,
    clock: Option<MockClock>,
    failing_writes: u32,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: MockClock) -> Self {
        Self { clock: Some(clock), ..Self::default() }
    }

    /// Queue one inbound line, as if the controller had sent it.
    pub fn push_input(&mut self, line: &str) {
        self.inbound.push_back(line.to_string());
    }

    pub fn lines(&self) -> Vec<&str> {
        self.written.iter().map(|(_, line)| line.as_str()).collect()
    }

    pub fn written(&self) -> &[(u32, String)] {
        &self.written
    }

    pub fn clear(&mut self) {
        self.written.clear();
    }

    /// Make the next `count` writes fail with a timeout, as a stalled serial port would.
    pub fn fail_writes(&mut self, count: u32) {
        self.failing_writes = count;
    }
}

impl Console for BufferConsole {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out"));
        }
        let at = self.clock.as_ref().map_or(0, |clock| clock.now_ms());
        self.written.push((at, line.to_string()));
        Ok(())
    }

    fn try_read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.inbound.pop_front())
    }
}
