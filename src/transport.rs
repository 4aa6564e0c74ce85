// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of mw-log.
//
// mw-log is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// mw-log is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even
// the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along with mw-log.  If not,
// see <http://www.gnu.org/licenses/>.

//! The byte transport beneath [`RemoteSink`](crate::remote::RemoteSink).
//!
//! This module defines the [`Transport`] trait along with UDP, TCP & (on Linux) Unix datagram
//! implementations. Each call to [`Transport::send`] carries exactly one DLT message; since a DLT
//! message carries its own length, stream transports need no further delimiting.
//!
//! # Examples
//!
//! To send to a DLT daemon listening on UDP port 3490 on localhost:
//!
//! ```rust
//! use mw_log::transport::UdpTransport;
//! let transpo = UdpTransport::local().unwrap();
//! ```
//!
//! On another host:
//!
//! ```rust
//! use mw_log::transport::UdpTransport;
//! let transpo = UdpTransport::new("some-host.domain.io:3490");
//! assert!(transpo.is_err()); // no such host, after all
//! ```

use crate::error::{Error, Result};

use backtrace::Backtrace;

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs},
    sync::Mutex,
    time::Duration,
};

#[cfg(target_os = "linux")]
use std::{os::unix::net::UnixDatagram, path::Path};

/// Default DLT daemon port
pub const DLT_PORT: u16 = 3490;

/// The largest payload a single UDP datagram can carry over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

fn transport_error(err: std::io::Error) -> Error {
    Error::Transport {
        source: Box::new(err),
        back: Backtrace::new(),
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      transport mechanisms                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations all transport layers must support.
pub trait Transport: Send + Sync {
    /// Send one complete message, returning the number of bytes sent.
    fn send(&self, buf: &[u8]) -> Result<usize>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        (**self).send(buf)
    }
}

/// Sending DLT messages via UDP datagrams.
pub struct UdpTransport {
    socket: std::net::UdpSocket,
}

impl UdpTransport {
    /// Construct a [`Transport`] implementation via UDP at `addr`.
    ///
    /// Each resolved address is tried in turn; the local socket is bound to an ephemeral port on
    /// the unspecified address of that address' family, so the daemon may live on any reachable
    /// interface.
    pub fn new<A: ToSocketAddrs>(addr: A) -> Result<UdpTransport> {
        let mut last_err = std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            "address resolved to nothing",
        );
        for remote in addr.to_socket_addrs().map_err(transport_error)? {
            let local: SocketAddr = match remote {
                SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
                SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
            };
            match std::net::UdpSocket::bind(local).and_then(|socket| {
                socket.connect(remote)?;
                Ok(socket)
            }) {
                Ok(socket) => return Ok(UdpTransport { socket }),
                Err(err) => last_err = err,
            }
        }
        Err(transport_error(last_err))
    }
    /// Construct a [`Transport`] implementation via UDP at localhost:3490
    pub fn local() -> Result<UdpTransport> {
        UdpTransport::new(("localhost", DLT_PORT))
    }
}

impl Transport for UdpTransport {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        self.socket.send(buf).map_err(transport_error)
    }
}

/// Sending DLT messages over a TCP connection.
///
/// The connection is made lazily & re-made on the first send after a failure, so a daemon that
/// restarts costs only the messages sent while it was down.
pub struct TcpTransport {
    addrs: Vec<SocketAddr>,
    timeout: Duration,
    socket: Mutex<Option<TcpStream>>,
}

impl TcpTransport {
    /// Default bound on connecting & on each write
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

    /// Construct a [`Transport`] implementation via TCP at `addr`; fails if `addr` doesn't
    /// resolve, but not if nothing is listening there yet.
    pub fn new<A: ToSocketAddrs>(addr: A) -> Result<TcpTransport> {
        TcpTransport::with_timeout(addr, TcpTransport::DEFAULT_TIMEOUT)
    }
    pub fn with_timeout<A: ToSocketAddrs>(addr: A, timeout: Duration) -> Result<TcpTransport> {
        let addrs: Vec<SocketAddr> = addr.to_socket_addrs().map_err(transport_error)?.collect();
        if addrs.is_empty() {
            return Err(transport_error(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "address resolved to nothing",
            )));
        }
        Ok(TcpTransport {
            addrs,
            timeout,
            socket: Mutex::new(None),
        })
    }
    /// Construct a [`Transport`] implementation via TCP at localhost:3490
    pub fn try_default() -> Result<TcpTransport> {
        TcpTransport::new(("localhost", DLT_PORT))
    }
    fn connect(&self) -> Result<TcpStream> {
        let mut last = None;
        for addr in &self.addrs {
            match TcpStream::connect_timeout(addr, self.timeout) {
                Ok(stream) => {
                    stream
                        .set_write_timeout(Some(self.timeout))
                        .map_err(transport_error)?;
                    stream.set_nodelay(true).map_err(transport_error)?;
                    return Ok(stream);
                }
                Err(err) => last = Some(err),
            }
        }
        Err(transport_error(last.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotConnected, "no address to connect to")
        })))
    }
}

impl Transport for TcpTransport {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        use std::io::Write;
        let mut socket = self
            .socket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if socket.is_none() {
            *socket = Some(self.connect()?);
        }
        let result = match socket.as_ref() {
            Some(stream) => {
                // `Write` is implemented on `&TcpStream` as well as `TcpStream`, so we can write
                // through a shared reference.
                let mut writer: &TcpStream = stream;
                writer.write_all(buf).and_then(|_| writer.flush())
            }
            None => Ok(()),
        };
        match result {
            Ok(()) => Ok(buf.len()),
            Err(err) => {
                // A partial write leaves the stream out of sync; start over on the next send.
                *socket = None;
                Err(transport_error(err))
            }
        }
    }
}

/// Sending DLT messages via a Unix datagram socket.
#[cfg(target_os = "linux")]
pub struct UnixSocket {
    socket: UnixDatagram,
}

#[cfg(target_os = "linux")]
impl UnixSocket {
    /// Construct a [`Transport`] implementation via Unix datagram sockets at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<UnixSocket> {
        let sock = UnixDatagram::unbound().map_err(transport_error)?;
        sock.connect(path).map_err(transport_error)?;
        Ok(UnixSocket { socket: sock })
    }
}

#[cfg(target_os = "linux")]
impl Transport for UnixSocket {
    fn send(&self, buf: &[u8]) -> Result<usize> {
        self.socket.send(buf).map_err(transport_error)
    }
}
