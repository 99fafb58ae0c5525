// SPDX-License-Identifier: MIT
use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use super::simulated::SimulatedAnalyser;
use crate::config::SIMULATION;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected to any instrument")]
    NotConnected,
    #[error("unsupported instrument resource '{0}' (expected Simulation or TCPIP::<host>::<port>::SOCKET)")]
    UnsupportedResource(String),
    #[error("instrument did not answer within {0:?}")]
    Timeout(Duration),
    #[error("malformed instrument response: {0}")]
    Malformed(String),
    #[error("instrument I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Line-oriented command channel to an instrument.
pub trait Transport: Send {
    /// # Errors
    ///
    /// Returns an error if the command cannot be delivered.
    fn write(&mut self, command: &str) -> Result<(), TransportError>;

    /// # Errors
    ///
    /// Returns an error on timeout or if the connection is lost.
    fn read(&mut self) -> Result<String, TransportError>;

    /// # Errors
    ///
    /// Returns an error if either the write or the read fails.
    fn query(&mut self, command: &str) -> Result<String, TransportError> {
        self.write(command)?;
        self.read()
    }

    /// # Errors
    ///
    /// Returns an error if the underlying connection fails to shut down.
    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resource {
    Simulation,
    Socket { host: String, port: u16 },
}

impl FromStr for Resource {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(SIMULATION) {
            return Ok(Self::Simulation);
        }
        let parts: Vec<&str> = s.split("::").collect();
        if let [interface, host, port, "SOCKET" | "socket"] = parts.as_slice()
            && interface.to_ascii_uppercase().starts_with("TCPIP")
            && !host.is_empty()
            && let Ok(port) = port.parse()
        {
            return Ok(Self::Socket {
                host: (*host).to_string(),
                port,
            });
        }
        Err(TransportError::UnsupportedResource(s.to_string()))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simulation => write!(f, "{SIMULATION}"),
            Self::Socket { host, port } => write!(f, "TCPIP::{host}::{port}::SOCKET"),
        }
    }
}

/// Opens a transport for `resource`.
///
/// # Errors
///
/// Returns an error if the socket cannot be reached within `timeout`.
pub fn open(resource: &Resource, timeout: Duration) -> Result<Box<dyn Transport>, TransportError> {
    match resource {
        Resource::Simulation => Ok(Box::new(SimulatedAnalyser::new())),
        Resource::Socket { host, port } => {
            Ok(Box::new(SocketTransport::connect(host, *port, timeout)?))
        }
    }
}

/// Raw SCPI over TCP: newline-terminated commands and replies.
pub struct SocketTransport {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    timeout: Duration,
}

impl SocketTransport {
    /// # Errors
    ///
    /// Returns an error if the host does not resolve or refuses the connection.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| TransportError::UnsupportedResource(format!("{host}:{port}")))?;
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            timeout,
        })
    }

    fn map_io(&self, err: io::Error) -> TransportError {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                TransportError::Timeout(self.timeout)
            }
            _ => TransportError::Io(err),
        }
    }
}

impl Transport for SocketTransport {
    fn write(&mut self, command: &str) -> Result<(), TransportError> {
        self.writer
            .write_all(format!("{command}\n").as_bytes())
            .map_err(|e| self.map_io(e))
    }

    fn read(&mut self) -> Result<String, TransportError> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).map_err(|e| self.map_io(e))?;
        if n == 0 {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "instrument closed the connection",
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self.writer.shutdown(std::net::Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

/// Strips an IEEE 488.2 definite-length block header (`#<n><n digits>`)
/// and parses the comma-separated values behind it.
///
/// # Errors
///
/// Returns [`TransportError::Malformed`] if the header or a value is invalid.
pub fn parse_block(reply: &str) -> Result<Vec<f64>, TransportError> {
    let reply = reply.trim();
    let body = match reply.strip_prefix('#') {
        Some(rest) => {
            let digits = rest
                .chars()
                .next()
                .and_then(|c| c.to_digit(10))
                .ok_or_else(|| TransportError::Malformed(format!("bad block header in '{}'", preview(reply))))?;
            let skip = 1 + digits as usize;
            rest.get(skip..)
                .ok_or_else(|| TransportError::Malformed(format!("truncated block header in '{}'", preview(reply))))?
        }
        None => reply,
    };
    body.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| TransportError::Malformed(format!("'{v}' is not a number")))
        })
        .collect()
}

/// Parses a single numeric reply such as a marker position.
///
/// # Errors
///
/// Returns [`TransportError::Malformed`] if the reply is not a number.
pub fn parse_number(reply: &str) -> Result<f64, TransportError> {
    reply
        .trim()
        .parse()
        .map_err(|_| TransportError::Malformed(format!("'{}' is not a number", preview(reply))))
}

fn preview(reply: &str) -> &str {
    match reply.char_indices().nth(32) {
        Some((i, _)) => &reply[..i],
        None => reply,
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    #[test]
    fn parses_resource_strings() {
        assert_eq!("Simulation".parse::<Resource>().unwrap(), Resource::Simulation);
        assert_eq!(
            "TCPIP0::192.168.1.20::5025::SOCKET".parse::<Resource>().unwrap(),
            Resource::Socket {
                host: "192.168.1.20".into(),
                port: 5025
            }
        );
        assert!(matches!(
            "TCPIP::127.0.0.1::HISLIP".parse::<Resource>(),
            Err(TransportError::UnsupportedResource(_))
        ));
        assert!("TCPIP::host::notaport::SOCKET".parse::<Resource>().is_err());
    }

    #[test]
    fn resource_display_round_trips() {
        let resource = Resource::Socket {
            host: "lab-sa".into(),
            port: 5555,
        };
        assert_eq!(resource.to_string().parse::<Resource>().unwrap(), resource);
    }

    #[test]
    fn block_header_is_stripped() {
        let values = parse_block("#9000000023 -1.5e+01, 2.25,3\n").unwrap();
        assert_eq!(values, vec![-15.0, 2.25, 3.0]);
        assert_eq!(parse_block("1,2").unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn malformed_blocks_are_rejected() {
        assert!(matches!(parse_block("#x12"), Err(TransportError::Malformed(_))));
        assert!(matches!(parse_block("#9001"), Err(TransportError::Malformed(_))));
        assert!(matches!(parse_block("1,abc"), Err(TransportError::Malformed(_))));
        assert!(matches!(parse_number("OFF"), Err(TransportError::Malformed(_))));
        assert!((parse_number(" 9.97e6\n").unwrap() - 9_970_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn socket_transport_exchanges_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert_eq!(line, "*IDN?\n");
            writer.write_all(b"RIGOL,DSA815,DSA8A0001,00.01.19\r\n").unwrap();
        });

        let mut transport =
            SocketTransport::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        assert_eq!(transport.query("*IDN?").unwrap(), "RIGOL,DSA815,DSA8A0001,00.01.19");
        server.join().unwrap();
        transport.close().unwrap();
    }

    #[test]
    fn silent_instrument_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || listener.accept().map(|(stream, _)| stream));

        let mut transport =
            SocketTransport::connect("127.0.0.1", port, Duration::from_millis(50)).unwrap();
        assert!(matches!(transport.read(), Err(TransportError::Timeout(_))));
        drop(server.join());
    }
}
