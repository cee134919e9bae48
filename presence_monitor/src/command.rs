//! Inbound command protocol.
//!
//! One newline-terminated command per line, compared after trimming. The only command is
//! `GET_CONFIG`; anything else is dropped without a reply.

use std::io;
use std::str::FromStr;

use tracing::debug;

use crate::console::Console;
use crate::link::SensorLink;
use crate::report::{sensitivity_response, write_lines};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Dump both sensitivity tables between `CONFIG_START` and `CONFIG_END`.
    GetConfig,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown command {0:?}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "GET_CONFIG" => Ok(Command::GetConfig),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

/// Handle at most one pending line. Never blocks when no line is ready.
pub fn service_commands<L, C>(link: &L, console: &mut C) -> io::Result<Option<Command>>
where
    L: SensorLink,
    C: Console + ?Sized,
{
    let Some(line) = console.try_read_line()? else {
        return Ok(None);
    };
    match line.parse::<Command>() {
        Ok(Command::GetConfig) => {
            write_lines(console, &sensitivity_response(link.configuration()))?;
            Ok(Some(Command::GetConfig))
        }
        Err(e) => {
            debug!("Ignoring {e}");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{BufferConsole, MockLink};
    use hlk_ld2410::Configuration;

    #[test]
    fn parses_after_trim() {
        assert_eq!("  GET_CONFIG\r".parse::<Command>(), Ok(Command::GetConfig));
        assert_eq!(
            "get_config".parse::<Command>(),
            Err(UnknownCommand("get_config".to_string()))
        );
    }

    #[test]
    fn get_config_lists_both_tables_in_gate_order() {
        let config = Configuration {
            motion_sensitivity: [50, 50, 40, 30, 20, 15, 15, 15, 15],
            stationary_sensitivity: [0, 0, 40, 40, 30, 30, 20, 20, 20],
            ..Configuration::default()
        };
        let mut link = MockLink::new().with_configuration(config);
        link.request_configuration().unwrap();
        let mut console = BufferConsole::new();
        console.push_input("GET_CONFIG\n");

        assert_eq!(service_commands(&link, &mut console).unwrap(), Some(Command::GetConfig));
        let lines = console.lines();
        assert_eq!(lines.len(), 20);
        assert_eq!(lines[0], "CONFIG_START");
        assert_eq!(lines[1], "SENSITIVITY_MOTION:0:50");
        assert_eq!(lines[9], "SENSITIVITY_MOTION:8:15");
        assert_eq!(lines[10], "SENSITIVITY_STATIC:0:0");
        assert_eq!(lines[18], "SENSITIVITY_STATIC:8:20");
        assert_eq!(lines[19], "CONFIG_END");
    }

    #[test]
    fn unknown_line_is_silent() {
        let link = MockLink::new();
        let mut console = BufferConsole::new();
        console.push_input("PING");
        assert_eq!(service_commands(&link, &mut console).unwrap(), None);
        assert!(console.lines().is_empty());
    }

    #[test]
    fn no_input_is_a_no_op() {
        let link = MockLink::new();
        let mut console = BufferConsole::new();
        assert_eq!(service_commands(&link, &mut console).unwrap(), None);
        assert!(console.lines().is_empty());
    }
}
