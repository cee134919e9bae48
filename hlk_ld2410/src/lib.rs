//! Driver for the **HLK-LD2410** 24 GHz human-presence radar
//!
//! This single-file crate gives you a *blocking*, `std`-based Rust interface to the
//! LD2410 (and the LD2410B/C variants) over a UART (`/dev/ttyUSB0`, `/dev/serial0`, …)
//! using the [`serialport`](https://crates.io/crates/serialport) crate.
//!
//! The radar streams report frames continuously on its own. The driver decodes them
//! on demand through [`Ld2410::poll`], and runs the request/ACK handshakes needed to
//! read the sensitivity tables, the firmware version, and to switch the module into
//! engineering mode.
//!
//! ```ignore
//! use hlk_ld2410::Ld2410;
//!
//! let mut radar = Ld2410::open("/dev/ttyUSB0", 256_000)?;
//! radar.connect()?;                                  // waits for the first report frame
//! radar.request_configuration()?;
//! radar.request_engineering_mode()?;
//!
//! loop {
//!     while radar.poll()? {}                         // drain buffered frames
//!     if radar.reading().presence() {
//!         println!("{:?}", radar.reading().moving_target());
//!     }
//! }
//! ```
//!
//! ---
//! # High-level contents
//! * **`Ld2410` struct** – owns the byte port, the receive buffer and the latest decoded
//!   reading / configuration / firmware version.
//! * **Data types** – [`Reading`], [`GateEnergies`], [`Configuration`], [`FirmwareVersion`].
//! * **Frame helpers** – [`encode_command`] and [`decode_frame`], pure functions over byte
//!   buffers so they can be tested without hardware.
//! * **Error handling** – one `Error` enum wrapping `std::io::Error` and `serialport::Error`
//!   plus protocol errors (`BadFrame`, `Length`, `Timeout`, `CommandRejected`).
//!
//! ## Wire format
//! | Frame            | Header        | Body                                  | Footer        |
//! |------------------|---------------|---------------------------------------|---------------|
//! | Report (radar →) | `F4 F3 F2 F1` | `len:u16` `type` `AA` … `55 00`       | `F8 F7 F6 F5` |
//! | Command (→ radar)| `FD FC FB FA` | `len:u16` `cmd:u16` payload           | `04 03 02 01` |
//! | ACK (radar →)    | `FD FC FB FA` | `len:u16` `cmd|0x0100` `status:u16` … | `04 03 02 01` |
//!
//! All multi-byte fields are little-endian. There is no checksum; integrity comes from
//! the length field plus the footer.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::{debug, info, warn};

/// Number of distance gates (0..=8) the module reports on.
pub const GATE_COUNT: usize = 9;

// ------------------------------------------------------------------------------------------------
// Protocol constants
// ------------------------------------------------------------------------------------------------

const REPORT_HEADER: [u8; 4] = [0xF4, 0xF3, 0xF2, 0xF1];
const REPORT_TAIL: [u8; 4] = [0xF8, 0xF7, 0xF6, 0xF5];
const CMD_HEADER: [u8; 4] = [0xFD, 0xFC, 0xFB, 0xFA];
const CMD_TAIL: [u8; 4] = [0x04, 0x03, 0x02, 0x01];

const REPORT_ENGINEERING: u8 = 0x01;
const REPORT_BASIC: u8 = 0x02;
const REPORT_HEAD: u8 = 0xAA;
const REPORT_END: u8 = 0x55;
const REPORT_CHECK: u8 = 0x00;

/// type + head + target block (9 bytes) + end + check
const BASIC_REPORT_LEN: usize = 13;
/// Engineering frames are 35 bytes of data; anything far beyond that is line noise.
const MAX_FRAME_DATA: usize = 64;
const ACK_FLAG: u16 = 0x0100;
const READ_CHUNK: usize = 256;

const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_millis(1000);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(1000);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const IDLE_WAIT: Duration = Duration::from_millis(1);

/// Command words understood by the module (subset used by this driver).
pub mod cmd {
    pub const ENABLE_CONFIG: u16 = 0x00FF;
    pub const END_CONFIG: u16 = 0x00FE;
    pub const READ_PARAMETERS: u16 = 0x0061;
    pub const ENABLE_ENGINEERING: u16 = 0x0062;
    pub const DISABLE_ENGINEERING: u16 = 0x0063;
    pub const READ_FIRMWARE: u16 = 0x00A0;
}

// ------------------------------------------------------------------------------------------------
// Error type
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial-port error: {0}")]
    SerialPort(#[from] serialport::Error),
    #[error("no answer from radar before timeout")]
    Timeout,
    #[error("malformed frame")]
    BadFrame,
    #[error("unexpected frame length {0}")]
    Length(usize),
    #[error("unknown report type {0:#04x}")]
    UnknownReport(u8),
    #[error("radar rejected command {command:#06x} with status {status:#06x}")]
    CommandRejected { command: u16, status: u16 },
}

// ------------------------------------------------------------------------------------------------
// Decoded data
// ------------------------------------------------------------------------------------------------

/// Target state byte of a report frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TargetState {
    #[default]
    None = 0,
    Moving = 1,
    Stationary = 2,
    Both = 3,
}

impl TargetState {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Moving),
            2 => Some(Self::Stationary),
            3 => Some(Self::Both),
            _ => None,
        }
    }
}

/// Distance and energy of one detected target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Target {
    pub distance_cm: u16,
    pub energy: u8,
}

/// Per-gate raw energies, only sent while engineering mode is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateEnergies {
    pub moving: [u8; GATE_COUNT],
    pub stationary: [u8; GATE_COUNT],
}

/// Latest report frame contents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reading {
    pub target: TargetState,
    pub moving_distance_cm: u16,
    pub moving_energy: u8,
    pub stationary_distance_cm: u16,
    pub stationary_energy: u8,
    pub detection_distance_cm: u16,
    /// `Some` only when the frame was an engineering report.
    pub gates: Option<GateEnergies>,
}

impl Reading {
    /// Any target at all.
    pub fn presence(&self) -> bool {
        self.target != TargetState::None
    }

    pub fn moving_target(&self) -> Option<Target> {
        matches!(self.target, TargetState::Moving | TargetState::Both).then_some(Target {
            distance_cm: self.moving_distance_cm,
            energy: self.moving_energy,
        })
    }

    pub fn stationary_target(&self) -> Option<Target> {
        matches!(self.target, TargetState::Stationary | TargetState::Both).then_some(Target {
            distance_cm: self.stationary_distance_cm,
            energy: self.stationary_energy,
        })
    }
}

/// Module parameters as returned by the read-parameters command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Configuration {
    pub max_gate: u8,
    pub max_moving_gate: u8,
    pub max_stationary_gate: u8,
    /// Seconds the output stays asserted after the last detection.
    pub idle_time_s: u16,
    pub motion_sensitivity: [u8; GATE_COUNT],
    pub stationary_sensitivity: [u8; GATE_COUNT],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub bugfix: u32,
}

impl std::fmt::Display for FirmwareVersion {
    /// Vendor notation: the bugfix field is a build date read in hex (`1.7.22091516`).
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{:X}", self.major, self.minor, self.bugfix)
    }
}

/// One complete frame lifted off the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Report(Reading),
    Ack { command: u16, status: u16, payload: Vec<u8> },
}

// ------------------------------------------------------------------------------------------------
// Frame helpers
// ------------------------------------------------------------------------------------------------

/// Build a command frame: header, length, command word, payload, footer.
pub fn encode_command(command: u16, payload: &[u8]) -> Vec<u8> {
    let len = (2 + payload.len()) as u16;
    let mut frame = Vec::with_capacity(12 + payload.len());
    frame.extend_from_slice(&CMD_HEADER);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&command.to_le_bytes());
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&CMD_TAIL);
    frame
}

#[derive(Clone, Copy)]
enum FrameKind {
    Report,
    Ack,
}

fn find_header(buf: &[u8]) -> Option<(usize, FrameKind)> {
    buf.windows(4).enumerate().find_map(|(i, w)| {
        if w == REPORT_HEADER {
            Some((i, FrameKind::Report))
        } else if w == CMD_HEADER {
            Some((i, FrameKind::Ack))
        } else {
            None
        }
    })
}

/// Take the next complete frame off the front of `rx`.
///
/// Returns `None` when `rx` does not hold a complete frame yet. Bytes in front of the
/// first header are discarded. On a corrupt frame only its first byte is dropped, so a
/// valid frame that starts inside the corrupt one is still found on the next call.
pub fn decode_frame(rx: &mut Vec<u8>) -> Option<Result<Frame, Error>> {
    let Some((start, kind)) = find_header(rx) else {
        // the last three bytes may be the start of a header
        let keep = rx.len().min(3);
        rx.drain(..rx.len() - keep);
        return None;
    };
    rx.drain(..start);
    if rx.len() < 6 {
        return None;
    }

    let len = u16::from_le_bytes([rx[4], rx[5]]) as usize;
    if len == 0 || len > MAX_FRAME_DATA {
        rx.drain(..1);
        return Some(Err(Error::Length(len)));
    }
    let total = 6 + len + 4;
    if rx.len() < total {
        return None;
    }

    let tail = match kind {
        FrameKind::Report => REPORT_TAIL,
        FrameKind::Ack => CMD_TAIL,
    };
    if rx[total - 4..total] != tail {
        rx.drain(..1);
        return Some(Err(Error::BadFrame));
    }

    let frame: Vec<u8> = rx.drain(..total).collect();
    let data = &frame[6..6 + len];
    Some(match kind {
        FrameKind::Report => parse_report(data).map(Frame::Report),
        FrameKind::Ack => parse_ack(data),
    })
}

fn le16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn parse_report(data: &[u8]) -> Result<Reading, Error> {
    if data.len() < BASIC_REPORT_LEN {
        return Err(Error::Length(data.len()));
    }
    if data[1] != REPORT_HEAD
        || data[data.len() - 2] != REPORT_END
        || data[data.len() - 1] != REPORT_CHECK
    {
        return Err(Error::BadFrame);
    }

    let target = TargetState::from_byte(data[2]).ok_or(Error::BadFrame)?;
    let mut reading = Reading {
        target,
        moving_distance_cm: le16(data, 3),
        moving_energy: data[5],
        stationary_distance_cm: le16(data, 6),
        stationary_energy: data[8],
        detection_distance_cm: le16(data, 9),
        gates: None,
    };

    match data[0] {
        REPORT_BASIC => {}
        REPORT_ENGINEERING => reading.gates = Some(parse_gates(&data[11..data.len() - 2])?),
        other => return Err(Error::UnknownReport(other)),
    }
    Ok(reading)
}

/// `[N][M][N+1 moving energies][M+1 stationary energies][light][out pin]`
fn parse_gates(body: &[u8]) -> Result<GateEnergies, Error> {
    if body.len() < 2 {
        return Err(Error::Length(body.len()));
    }
    let moving_count = body[0] as usize + 1;
    let stationary_count = body[1] as usize + 1;
    let end = 2 + moving_count + stationary_count;
    if body.len() < end {
        return Err(Error::Length(body.len()));
    }

    let mut gates = GateEnergies::default();
    let moving = &body[2..2 + moving_count];
    let stationary = &body[2 + moving_count..end];
    for (dst, src) in gates.moving.iter_mut().zip(moving) {
        *dst = *src;
    }
    for (dst, src) in gates.stationary.iter_mut().zip(stationary) {
        *dst = *src;
    }
    Ok(gates)
}

fn parse_ack(data: &[u8]) -> Result<Frame, Error> {
    if data.len() < 4 {
        return Err(Error::Length(data.len()));
    }
    Ok(Frame::Ack {
        command: le16(data, 0),
        status: le16(data, 2),
        payload: data[4..].to_vec(),
    })
}

fn parse_parameters(payload: &[u8]) -> Result<Configuration, Error> {
    // head, 3 gate limits, 2 sensitivity tables, idle time
    const LEN: usize = 1 + 3 + 2 * GATE_COUNT + 2;
    if payload.len() < LEN {
        return Err(Error::Length(payload.len()));
    }
    if payload[0] != REPORT_HEAD {
        return Err(Error::BadFrame);
    }

    let mut config = Configuration {
        max_gate: payload[1],
        max_moving_gate: payload[2],
        max_stationary_gate: payload[3],
        idle_time_s: le16(payload, 4 + 2 * GATE_COUNT),
        ..Configuration::default()
    };
    config
        .motion_sensitivity
        .copy_from_slice(&payload[4..4 + GATE_COUNT]);
    config
        .stationary_sensitivity
        .copy_from_slice(&payload[4 + GATE_COUNT..4 + 2 * GATE_COUNT]);
    Ok(config)
}

fn parse_firmware(payload: &[u8]) -> Result<FirmwareVersion, Error> {
    if payload.len() < 8 {
        return Err(Error::Length(payload.len()));
    }
    Ok(FirmwareVersion {
        minor: payload[2],
        major: payload[3],
        bugfix: u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]),
    })
}

// ------------------------------------------------------------------------------------------------
// Main driver struct
// ------------------------------------------------------------------------------------------------

pub struct Ld2410<P> {
    port: P,
    rx: Vec<u8>,
    reading: Reading,
    configuration: Configuration,
    firmware: Option<FirmwareVersion>,
    last_frame: Option<Instant>,
    link_timeout: Duration,
    command_timeout: Duration,
}

impl Ld2410<Box<dyn SerialPort>> {
    /// Open the given serial device at `baud` (the module ships at 256 000 baud).
    ///
    /// The port gets a 1 ms read timeout so [`Ld2410::poll`] returns promptly when the
    /// radar has nothing buffered.
    pub fn open(path: &str, baud: u32) -> Result<Self, Error> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(1))
            .open()?;
        info!("Opened {path} at {baud} baud");
        Ok(Self::new(port))
    }
}

impl<P> Ld2410<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            rx: Vec::with_capacity(READ_CHUNK),
            reading: Reading::default(),
            configuration: Configuration::default(),
            firmware: None,
            last_frame: None,
            link_timeout: DEFAULT_LINK_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Override how long a link counts as alive after the last frame, and how long a
    /// command waits for its ACK.
    pub fn with_timeouts(mut self, link: Duration, command: Duration) -> Self {
        self.link_timeout = link;
        self.command_timeout = command;
        self
    }

    /// True while a valid frame arrived within the link timeout.
    pub fn is_connected(&self) -> bool {
        self.last_frame
            .is_some_and(|at| at.elapsed() <= self.link_timeout)
    }

    pub fn reading(&self) -> &Reading {
        &self.reading
    }

    /// Zeroed until [`Ld2410::request_configuration`] succeeds.
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn firmware(&self) -> Option<FirmwareVersion> {
        self.firmware
    }

    /// Release the underlying port.
    pub fn free(self) -> P {
        self.port
    }
}

impl<P: Read + Write> Ld2410<P> {
    /// Pull whatever the port has buffered into `rx`. A read timeout means "nothing yet".
    fn fill(&mut self) -> Result<usize, Error> {
        let mut chunk = [0u8; READ_CHUNK];
        match self.port.read(&mut chunk) {
            Ok(n) => {
                self.rx.extend_from_slice(&chunk[..n]);
                Ok(n)
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn accept_report(&mut self, reading: Reading) {
        self.reading = reading;
        self.last_frame = Some(Instant::now());
    }

    /// Decode at most one buffered frame. Returns `Ok(true)` if a report was decoded,
    /// `Ok(false)` when no complete frame is pending.
    pub fn poll(&mut self) -> Result<bool, Error> {
        self.fill()?;
        loop {
            match decode_frame(&mut self.rx) {
                None => return Ok(false),
                Some(Ok(Frame::Report(reading))) => {
                    self.accept_report(reading);
                    return Ok(true);
                }
                Some(Ok(Frame::Ack { command, .. })) => {
                    debug!("Dropping unsolicited ACK {command:#06x}");
                }
                Some(Err(e)) => debug!("Skipping frame: {e}"),
            }
        }
    }

    /// Wait for the first report frame, then read the firmware version.
    ///
    /// A failed firmware read is logged and leaves [`Ld2410::firmware`] empty; only the
    /// absence of any report frame fails the connect.
    #[tracing::instrument(skip(self))]
    pub fn connect(&mut self) -> Result<(), Error> {
        let start = Instant::now();
        while !self.poll()? {
            if start.elapsed() > CONNECT_TIMEOUT {
                return Err(Error::Timeout);
            }
            std::thread::sleep(IDLE_WAIT);
        }
        info!("Radar is streaming reports");

        match self.request_firmware_version() {
            Ok(version) => info!("Firmware version {version}"),
            Err(e) => warn!("Could not read firmware version: {e}"),
        }
        Ok(())
    }

    /// Send a command frame and wait for its ACK, returning the ACK payload.
    /// Report frames that show up in the meantime still update the reading.
    fn command(&mut self, command: u16, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let frame = encode_command(command, payload);
        self.port.write_all(&frame)?;
        self.port.flush()?;

        let start = Instant::now();
        loop {
            while let Some(decoded) = decode_frame(&mut self.rx) {
                match decoded {
                    Ok(Frame::Report(reading)) => self.accept_report(reading),
                    Ok(Frame::Ack { command: acked, status, payload })
                        if acked == command | ACK_FLAG =>
                    {
                        if status != 0 {
                            return Err(Error::CommandRejected { command, status });
                        }
                        return Ok(payload);
                    }
                    Ok(Frame::Ack { command: acked, .. }) => {
                        debug!("Ignoring ACK {acked:#06x} while waiting for {command:#06x}");
                    }
                    Err(e) => debug!("Skipping frame: {e}"),
                }
            }
            if start.elapsed() > self.command_timeout {
                return Err(Error::Timeout);
            }
            if self.fill()? == 0 {
                std::thread::sleep(IDLE_WAIT);
            }
        }
    }

    /// Run `f` between enable-config and end-config. End-config is always sent.
    fn with_config_mode<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        self.command(cmd::ENABLE_CONFIG, &[0x01, 0x00])?;
        let result = f(self);
        match self.command(cmd::END_CONFIG, &[]) {
            Ok(_) => result,
            Err(e) => {
                warn!("Radar did not leave configuration mode: {e}");
                result.and(Err(e))
            }
        }
    }

    /// Read gate limits, idle time and both sensitivity tables.
    #[tracing::instrument(skip(self))]
    pub fn request_configuration(&mut self) -> Result<&Configuration, Error> {
        let payload = self.with_config_mode(|radar| radar.command(cmd::READ_PARAMETERS, &[]))?;
        self.configuration = parse_parameters(&payload)?;
        Ok(&self.configuration)
    }

    /// Switch the module to engineering reports (per-gate energies).
    #[tracing::instrument(skip(self))]
    pub fn request_engineering_mode(&mut self) -> Result<(), Error> {
        self.with_config_mode(|radar| radar.command(cmd::ENABLE_ENGINEERING, &[]).map(drop))
    }

    /// Back to basic reports.
    pub fn disable_engineering_mode(&mut self) -> Result<(), Error> {
        self.with_config_mode(|radar| radar.command(cmd::DISABLE_ENGINEERING, &[]).map(drop))
    }

    pub fn request_firmware_version(&mut self) -> Result<FirmwareVersion, Error> {
        let payload = self.with_config_mode(|radar| radar.command(cmd::READ_FIRMWARE, &[]))?;
        let version = parse_firmware(&payload)?;
        self.firmware = Some(version);
        Ok(version)
    }
}
