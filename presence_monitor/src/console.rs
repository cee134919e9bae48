//! Line-oriented transports for the status stream and inbound commands.
//!
//! Reading is always non-blocking: [`Console::try_read_line`] returns `Ok(None)` unless a
//! complete newline-terminated line is already available.

use std::collections::VecDeque;
use std::io::{self, BufRead, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{info, warn};

/// Longest inbound line kept; anything longer is discarded up to the next newline.
pub const MAX_LINE_LEN: usize = 256;

pub trait Console {
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Next complete inbound line without its terminator, if one is ready.
    fn try_read_line(&mut self) -> io::Result<Option<String>>;
}

impl<C: Console + ?Sized> Console for Box<C> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        (**self).write_line(line)
    }

    fn try_read_line(&mut self) -> io::Result<Option<String>> {
        (**self).try_read_line()
    }
}

/// Status on stdout, commands from stdin.
///
/// Stdin has no portable non-blocking read, so a reader thread forwards lines over a
/// channel and the cycle only ever calls `try_recv`.
pub struct StdioConsole {
    lines: Receiver<String>,
}

impl StdioConsole {
    pub fn spawn() -> Self {
        let (tx, lines) = mpsc::channel();
        std::thread::spawn(move || forward_lines(io::stdin().lock(), &tx));
        Self { lines }
    }
}

/// Send every line of `reader` down `tx` until EOF, a read error, or a dropped receiver.
///
/// Bytes that are not UTF-8 are replaced rather than ending the stream, so one garbled
/// line costs that line only.
fn forward_lines<R: BufRead>(mut reader: R, tx: &Sender<String>) {
    let mut lines = LineAssembler::new();
    loop {
        let chunk = match reader.fill_buf() {
            Ok([]) => break,
            Ok(chunk) => chunk,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("stdin read failed: {e}");
                break;
            }
        };
        let len = chunk.len();
        lines.push(chunk);
        reader.consume(len);
        while let Some(line) = lines.pop() {
            if tx.send(line).is_err() {
                return;
            }
        }
    }
    if let Some(line) = lines.finish() {
        let _ = tx.send(line);
    }
}

/// Splits a byte stream into lines, dropping any line longer than [`MAX_LINE_LEN`].
#[derive(Debug, Default)]
pub struct LineAssembler {
    partial: Vec<u8>,
    overflowed: bool,
    ready: VecDeque<String>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b'\n' {
                if !self.overflowed {
                    let text = String::from_utf8_lossy(&self.partial);
                    self.ready.push_back(text.trim_end_matches('\r').to_string());
                }
                self.partial.clear();
                self.overflowed = false;
            } else if self.overflowed {
                // discard until the next newline
            } else if self.partial.len() < MAX_LINE_LEN {
                self.partial.push(byte);
            } else {
                warn!("Dropping inbound line longer than {MAX_LINE_LEN} bytes");
                self.partial.clear();
                self.overflowed = true;
            }
        }
    }

    pub fn pop(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    pub fn has_line(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Take the unterminated remainder at end of input.
    pub fn finish(&mut self) -> Option<String> {
        let overflowed = std::mem::take(&mut self.overflowed);
        let rest = std::mem::take(&mut self.partial);
        if overflowed || rest.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string())
    }

    /// Bytes held for the line still being received.
    pub fn pending_len(&self) -> usize {
        self.partial.len()
    }
}

/// A second UART (e.g. a USB-serial adapter to the controlling PC).
pub struct SerialConsole {
    port: Box<dyn SerialPort>,
    inbound: LineAssembler,
}

impl SerialConsole {
    pub fn open(path: &str, baud: u32) -> Result<Self, serialport::Error> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(10))
            .open()?;
        info!("Status console on {path} at {baud} baud");
        Ok(Self { port, inbound: LineAssembler::new() })
    }
}

impl Console for SerialConsole {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\r\n")?;
        self.port.flush()
    }

    fn try_read_line(&mut self) -> io::Result<Option<String>> {
        if !self.inbound.has_line() {
            let pending = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
            if pending > 0 {
                let mut buf = vec![0u8; pending];
                let n = self.port.read(&mut buf)?;
                self.inbound.push(&buf[..n]);
            }
        }
        Ok(self.inbound.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn forwarded(input: &[u8]) -> Vec<String> {
        let (tx, rx) = mpsc::channel();
        forward_lines(Cursor::new(input.to_vec()), &tx);
        drop(tx);
        rx.iter().collect()
    }

    #[test]
    fn invalid_utf8_line_does_not_end_the_stream() {
        assert_eq!(forwarded(b"A\xff\nGET_CONFIG\n"), vec!["A\u{fffd}", "GET_CONFIG"]);
    }

    #[test]
    fn forwards_crlf_and_unterminated_last_line() {
        assert_eq!(forwarded(b"PING\r\nGET_CONFIG"), vec!["PING", "GET_CONFIG"]);
    }

    #[test]
    fn overlong_stdin_line_is_dropped() {
        let mut input = vec![b'x'; MAX_LINE_LEN * 4];
        input.extend_from_slice(b"\nGET_CONFIG\n");
        assert_eq!(forwarded(&input), vec!["GET_CONFIG"]);
    }

    #[test]
    fn assembles_lines_across_chunks() {
        let mut lines = LineAssembler::new();
        lines.push(b"GET_");
        assert!(!lines.has_line());
        lines.push(b"CONFIG\r\nPI");
        assert_eq!(lines.pop().as_deref(), Some("GET_CONFIG"));
        assert_eq!(lines.pop(), None);
        lines.push(b"NG\n");
        assert_eq!(lines.pop().as_deref(), Some("PING"));
    }

    #[test]
    fn overlong_line_is_dropped_and_buffer_stays_bounded() {
        let mut lines = LineAssembler::new();
        for _ in 0..100 {
            lines.push(&[b'x'; 64]);
            assert!(lines.pending_len() <= MAX_LINE_LEN);
        }
        lines.push(b"tail\nGET_CONFIG\n");
        assert_eq!(lines.pop().as_deref(), Some("GET_CONFIG"));
        assert_eq!(lines.pop(), None);
        assert_eq!(lines.pending_len(), 0);
    }
}
