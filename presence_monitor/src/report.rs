//! Text of the human-readable status stream.
//!
//! Everything here is pure formatting; the components decide when a block is written.
//! A controller on the other end parses these lines, so the layout is part of the
//! interface: `Presence: ...`, `GATES_MOV:...`, `Gate <i>: <value>`, and the
//! `CONFIG_START` / `CONFIG_END` framed response.

use std::fmt::Write;
use std::io;

use hlk_ld2410::{Configuration, FirmwareVersion, Reading, GATE_COUNT};

use crate::console::Console;

pub const SEPARATOR: &str = "====================================";
pub const DISCONNECTED_NOTICE: &str = "Radar disconnected - Check connections";

/// Write every line of a block, stopping at the first transport error.
pub fn write_lines<C: Console + ?Sized>(console: &mut C, lines: &[String]) -> io::Result<()> {
    lines.iter().try_for_each(|line| console.write_line(line))
}

pub fn banner(radar_port: &str, radar_baud: u32) -> Vec<String> {
    vec![
        SEPARATOR.to_string(),
        "LD2410 Presence Monitor".to_string(),
        SEPARATOR.to_string(),
        format!("Radar port: {radar_port} @ {radar_baud} baud"),
    ]
}

pub fn firmware_block(version: FirmwareVersion) -> Vec<String> {
    vec![
        SEPARATOR.to_string(),
        "FIRMWARE INFORMATION:".to_string(),
        SEPARATOR.to_string(),
        format!("Version: {version}"),
    ]
}

/// Startup / retry configuration report.
pub fn configuration_block(config: &Configuration) -> Vec<String> {
    let mut lines = vec![
        SEPARATOR.to_string(),
        "SENSOR CONFIGURATION:".to_string(),
        SEPARATOR.to_string(),
        format!("Max gate: {}", config.max_gate),
        format!("Max moving gate: {}", config.max_moving_gate),
        format!("Max stationary gate: {}", config.max_stationary_gate),
        format!("Sensor idle time: {} seconds", config.idle_time_s),
        String::new(),
        "Motion Sensitivity (per gate):".to_string(),
    ];
    lines.extend(gate_lines(&config.motion_sensitivity));
    lines.push(String::new());
    lines.push("Stationary Sensitivity (per gate):".to_string());
    lines.extend(gate_lines(&config.stationary_sensitivity));
    lines.push(SEPARATOR.to_string());
    lines
}

fn gate_lines(values: &[u8; GATE_COUNT]) -> impl Iterator<Item = String> + '_ {
    values
        .iter()
        .enumerate()
        .map(|(gate, value)| format!("  Gate {gate}: {value}"))
}

pub fn detection_header(report_interval_ms: u32) -> Vec<String> {
    vec![
        SEPARATOR.to_string(),
        "REAL-TIME DETECTION DATA:".to_string(),
        format!("(Updates every {report_interval_ms}ms)"),
        "Format: Presence: YES/NO | Stationary: XXcm E:YY | Moving: XXcm E:YY".to_string(),
        SEPARATOR.to_string(),
    ]
}

/// `Presence: YES | Stationary: 85cm E:60 | Moving: 120cm E:45`
pub fn presence_line(reading: &Reading) -> String {
    if !reading.presence() {
        return "Presence: NO".to_string();
    }
    let mut line = String::from("Presence: YES");
    if let Some(target) = reading.stationary_target() {
        let _ = write!(line, " | Stationary: {}cm E:{}", target.distance_cm, target.energy);
    }
    if let Some(target) = reading.moving_target() {
        let _ = write!(line, " | Moving: {}cm E:{}", target.distance_cm, target.energy);
    }
    line
}

/// `GATES_MOV:v0,...,v8 | GATES_STAT:v0,...,v8`, zeros until an engineering frame arrives.
pub fn gates_line(reading: &Reading) -> String {
    let gates = reading.gates.unwrap_or_default();
    format!(
        "GATES_MOV:{} | GATES_STAT:{}",
        join(&gates.moving),
        join(&gates.stationary)
    )
}

fn join(values: &[u8]) -> String {
    values
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Framed answer to `GET_CONFIG`: motion gates 0..8, then static gates 0..8.
pub fn sensitivity_response(config: &Configuration) -> Vec<String> {
    let motion = config
        .motion_sensitivity
        .iter()
        .enumerate()
        .map(|(gate, value)| format!("SENSITIVITY_MOTION:{gate}:{value}"));
    let stationary = config
        .stationary_sensitivity
        .iter()
        .enumerate()
        .map(|(gate, value)| format!("SENSITIVITY_STATIC:{gate}:{value}"));

    std::iter::once("CONFIG_START".to_string())
        .chain(motion)
        .chain(stationary)
        .chain(std::iter::once("CONFIG_END".to_string()))
        .collect()
}
