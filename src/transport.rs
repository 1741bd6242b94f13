// Copyright (C) 2022-2026 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of tracing-gelf-handler.
//
// tracing-gelf-handler is free software: you can redistribute it and/or modify it under the terms
// of the GNU General Public License as published by the Free Software Foundation, either version 3
// of the License, or (at your option) any later version.
//
// mpdpopm is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even
// the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along with mpdpopm.  If not,
// see <http://www.gnu.org/licenses/>.

//! The GELF transport layer.
//!
//! This module defines the [`MessageSender`] trait that all transports must support, the
//! [`Connector`] trait responsible for constructing them, and UDP & TCP implementations of both.
//!
//! # Examples
//!
//! Which transport gets used is determined by the configured collector:
//!
//! ```rust
//! use tracing_gelf_handler::transport::{Protocol, Target};
//! let target = Target::parse("tcp:10.0.0.1", 9000);
//! assert_eq!(target.protocol, Protocol::Tcp);
//! assert_eq!(target.host, "10.0.0.1");
//! let target = Target::parse("graylog.example.com", 12201);
//! assert_eq!(target.protocol, Protocol::Udp);
//! ```
//!
//! Connecting to a non-existent host fails:
//!
//! ```rust
//! use tracing_gelf_handler::transport::UdpSender;
//! let transpo = UdpSender::new("some-host.domain.invalid", 12201);
//! assert!(transpo.is_err()); // no such host, after all
//! ```

use crate::{
    error::{Error, Result},
    message::GelfMessage,
};

use backtrace::Backtrace;
use bytes::{BufMut, BytesMut};

use std::{
    io::Write,
    net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket},
};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      transport selection                                       //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Protocol {
    /// stream transport
    Tcp,
    /// datagram transport
    Udp,
}

/// Where (and how) to send messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
}

impl Target {
    /// Interpret a configured collector specification.
    ///
    /// A `tcp:` prefix selects TCP, a `udp:` prefix UDP; in either case the remainder of `spec` is
    /// the host. With no recognized prefix, `spec` in its entirety is the host, and UDP is used.
    pub fn parse(spec: &str, port: u16) -> Target {
        let (protocol, host) = if let Some(host) = spec.strip_prefix("tcp:") {
            (Protocol::Tcp, host)
        } else if let Some(host) = spec.strip_prefix("udp:") {
            (Protocol::Udp, host)
        } else {
            (Protocol::Udp, spec)
        };
        Target {
            protocol,
            host: host.to_owned(),
            port,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = match self.protocol {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        };
        write!(f, "{}:{}:{}", scheme, self.host, self.port)
    }
}

fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|err| Error::UnknownHost {
            host: host.to_owned(),
            source: err,
            back: Backtrace::new(),
        })?
        .collect();
    if addrs.is_empty() {
        return Err(Error::UnknownHost {
            host: host.to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
            back: Backtrace::new(),
        });
    }
    Ok(addrs)
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      transport mechanisms                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations all transports must support.
pub trait MessageSender: Send {
    /// Send `message` on this transport.
    ///
    /// `Ok(false)` means the transport declined the message (it was too large, say); `Err` means
    /// it tried & failed.
    fn send_message(&mut self, message: &GelfMessage) -> Result<bool>;
    /// Release any resources held by this transport. No further sends will be attempted.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Constructs [`MessageSender`]s.
///
/// [`GelfHandler`](crate::handler::GelfHandler) calls this lazily, on the first publish (and on
/// subsequent publishes, until a call succeeds). Swapping-in a different implementation is how
/// tests (or exotic deployments) substitute their own transport.
pub trait Connector: Send + Sync {
    fn connect(&self, target: &Target) -> Result<Box<dyn MessageSender>>;
}

/// The [`Connector`] that opens real sockets.
#[derive(Clone, Debug, Default)]
pub struct NetConnector;

impl Connector for NetConnector {
    fn connect(&self, target: &Target) -> Result<Box<dyn MessageSender>> {
        Ok(match target.protocol {
            Protocol::Tcp => Box::new(TcpSender::new(&target.host, target.port)?),
            Protocol::Udp => Box::new(UdpSender::new(&target.host, target.port)?),
        })
    }
}

/// GELF chunked-message magic bytes
const CHUNK_MAGIC: [u8; 2] = [0x1e, 0x0f];
/// The most chunks a single message may be split into
pub const MAX_CHUNKS: usize = 128;
/// Payload bytes per chunk (& the largest message sent unchunked)
pub const CHUNK_SIZE: usize = 1420;

/// Sending GELF messages via UDP datagrams.
///
/// Messages that won't fit in a single [`CHUNK_SIZE`] datagram are split into GELF chunks.
pub struct UdpSender {
    socket: UdpSocket,
    next_id: u64,
}

impl UdpSender {
    /// Construct a [`MessageSender`] implementation via UDP at `host`:`port`.
    pub fn new(host: &str, port: u16) -> Result<UdpSender> {
        let addrs = resolve(host, port)?;
        // Bind to any available port on an interface of the right family...
        let local = if addrs[0].is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(local).map_err(|err| Error::Socket {
            source: err,
            back: Backtrace::new(),
        })?;
        // and connect to the collector:
        socket.connect(&addrs[..]).map_err(|err| Error::Socket {
            source: err,
            back: Backtrace::new(),
        })?;
        let seed = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
        Ok(UdpSender {
            socket,
            next_id: seed,
        })
    }

    /// Split `payload` into GELF chunks; `None` if it would take more than [`MAX_CHUNKS`].
    fn chunk(&mut self, payload: &[u8]) -> Option<Vec<BytesMut>> {
        let count = payload.len().div_ceil(CHUNK_SIZE);
        if count > MAX_CHUNKS {
            return None;
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        Some(
            payload
                .chunks(CHUNK_SIZE)
                .enumerate()
                .map(|(seq, piece)| {
                    let mut buf = BytesMut::with_capacity(12 + piece.len());
                    buf.put_slice(&CHUNK_MAGIC);
                    buf.put_u64(id);
                    buf.put_u8(seq as u8);
                    buf.put_u8(count as u8);
                    buf.put_slice(piece);
                    buf
                })
                .collect(),
        )
    }
}

impl MessageSender for UdpSender {
    fn send_message(&mut self, message: &GelfMessage) -> Result<bool> {
        let payload = message.to_json()?;
        if payload.len() <= CHUNK_SIZE {
            self.socket.send(&payload)?;
            return Ok(true);
        }
        match self.chunk(&payload) {
            Some(chunks) => {
                for chunk in chunks {
                    self.socket.send(&chunk)?;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Sending GELF messages via a TCP stream, each message terminated by a null byte.
///
/// If a write fails, the stream is discarded & re-established on the next send.
pub struct TcpSender {
    addrs: Vec<SocketAddr>,
    stream: Option<TcpStream>,
}

impl TcpSender {
    /// Construct a [`MessageSender`] implementation via TCP at `host`:`port`.
    pub fn new(host: &str, port: u16) -> Result<TcpSender> {
        let addrs = resolve(host, port)?;
        let stream = TcpSender::open(&addrs)?;
        Ok(TcpSender {
            addrs,
            stream: Some(stream),
        })
    }
    fn open(addrs: &[SocketAddr]) -> Result<TcpStream> {
        TcpStream::connect(addrs).map_err(|err| Error::Socket {
            source: err,
            back: Backtrace::new(),
        })
    }
}

impl MessageSender for TcpSender {
    fn send_message(&mut self, message: &GelfMessage) -> Result<bool> {
        let payload = message.to_json()?;
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => TcpSender::open(&self.addrs)?,
        };
        let mut writer = &stream;
        writer
            .write_all(&payload)
            .and_then(|_| writer.write_all(&[0]))
            .and_then(|_| writer.flush())?;
        // Only keep the stream if it's still good.
        self.stream = Some(stream);
        Ok(true)
    }
    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            match stream.shutdown(std::net::Shutdown::Both) {
                Err(err) if err.kind() != std::io::ErrorKind::NotConnected => {
                    return Err(err.into())
                }
                _ => (),
            }
        }
        Ok(())
    }
}
