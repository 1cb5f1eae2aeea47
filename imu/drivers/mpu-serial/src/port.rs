use imu_traits::ImuError;
use log::trace;
use std::io::{self, Read};
use std::time::{Duration, Instant};

// Longest line we buffer before giving up on finding a newline.
const MAX_LINE_LEN: usize = 1024;

/// A newline-delimited text stream with a bounded read.
pub trait LineSource: Send {
    /// Returns the next trimmed line, or `None` when nothing complete arrived
    /// within the read timeout (including blank lines and end of stream).
    fn read_line(&mut self) -> Result<Option<String>, ImuError>;
}

/// Enumerates and opens candidate ports.
pub trait PortProvider: Send + Sync {
    type Link: LineSource + 'static;

    fn list_ports(&self) -> Result<Vec<String>, ImuError>;

    fn open(&self, name: &str, baud_rate: u32, timeout: Duration)
        -> Result<Self::Link, ImuError>;
}

/// Ports reported by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl PortProvider for SystemPorts {
    type Link = SerialLine;

    fn list_ports(&self) -> Result<Vec<String>, ImuError> {
        Ok(serialport::available_ports()?
            .into_iter()
            .map(|p| p.port_name)
            .collect())
    }

    fn open(&self, name: &str, baud_rate: u32, timeout: Duration) -> Result<SerialLine, ImuError> {
        let port = serialport::new(name, baud_rate).timeout(timeout).open()?;
        Ok(SerialLine::new(port, timeout))
    }
}

/// Line reader over an open serial port. Bytes of a line split across a
/// timeout are kept for the next call.
pub struct SerialLine {
    port: Box<dyn serialport::SerialPort>,
    timeout: Duration,
    pending: Vec<u8>,
}

impl SerialLine {
    pub fn new(port: Box<dyn serialport::SerialPort>, timeout: Duration) -> Self {
        SerialLine {
            port,
            timeout,
            pending: Vec::with_capacity(MAX_LINE_LEN),
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(decode_line(&raw))
    }
}

/// Decodes a raw line, dropping bytes that are not valid UTF-8.
pub(crate) fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .replace(char::REPLACEMENT_CHARACTER, "")
        .trim()
        .to_string()
}

impl LineSource for SerialLine {
    fn read_line(&mut self) -> Result<Option<String>, ImuError> {
        let deadline = Instant::now() + self.timeout;
        let mut buffer = [0u8; 256];

        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line).filter(|l| !l.is_empty()));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }

            match self.port.read(&mut buffer) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    self.pending.extend_from_slice(&buffer[..n]);
                    if self.pending.len() > MAX_LINE_LEN && !self.pending.contains(&b'\n') {
                        trace!("Dropping {} bytes without a newline", self.pending.len());
                        self.pending.clear();
                        return Err(ImuError::InvalidPacket("line too long".to_string()));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_strips_invalid_bytes_and_whitespace() {
        assert_eq!(decode_line(b"X:1 Y:2\r\n"), "X:1 Y:2");
        assert_eq!(decode_line(b"\xffGyro:OK\xfe\n"), "Gyro:OK");
        assert_eq!(decode_line(b"\r\n"), "");
    }
}
