//! One-shot result channel between a worker and its caller.
//!
//! A pipe carrying exactly one JSON document. The sender is consumed by
//! [`ReportSender::send`]; the receiver is drained without blocking while the
//! caller polls the worker, and decoded once with [`ReportReceiver::finish`].
//! An empty channel is never waited on.

use crate::config::types::Result;
use crate::kernel::fd::{pipe_cloexec, set_nonblocking};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

/// What a drained channel held
#[derive(Debug, PartialEq)]
pub enum Received<T> {
    /// Nothing was ever written
    Empty,
    Value(T),
    /// The producer wrote more than the configured limit (bytes seen)
    Oversized(usize),
    /// Bytes arrived but did not decode, e.g. a write cut short by a kill
    Corrupt(String),
}

/// Allocate a fresh channel
pub fn open(max_bytes: usize) -> Result<(ReportSender, ReportReceiver)> {
    let (read, write) = pipe_cloexec()?;
    set_nonblocking(read.as_raw_fd())?;
    Ok((
        ReportSender { fd: write },
        ReportReceiver {
            file: File::from(read),
            buf: Vec::new(),
            seen: 0,
            max_bytes,
            eof: false,
        },
    ))
}

/// Producer half, owned by the worker
#[derive(Debug)]
pub struct ReportSender {
    fd: OwnedFd,
}

impl ReportSender {
    /// Rebuild a sender around a descriptor the worker already owns.
    ///
    /// # Safety
    /// `fd` must be an open pipe write end not owned by anything else.
    pub unsafe fn from_raw_fd(fd: RawFd) -> Self {
        Self {
            fd: OwnedFd::from_raw_fd(fd),
        }
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    pub fn into_raw_fd(self) -> RawFd {
        self.fd.into_raw_fd()
    }

    /// Write the single value this channel will ever carry
    pub fn send<T: Serialize>(self, value: &T) -> io::Result<()> {
        let payload = serde_json::to_vec(value).map_err(io::Error::other)?;
        let mut file = File::from(self.fd);
        file.write_all(&payload)?;
        file.flush()
    }
}

/// Consumer half, owned by the caller
#[derive(Debug)]
pub struct ReportReceiver {
    file: File,
    buf: Vec<u8>,
    seen: usize,
    max_bytes: usize,
    eof: bool,
}

impl ReportReceiver {
    /// Read whatever is available right now. Never blocks.
    ///
    /// Bytes past `max_bytes` are read and discarded so the producer is not
    /// stalled on a full pipe.
    pub fn drain(&mut self) -> Result<()> {
        let mut chunk = [0u8; 4096];
        while !self.eof {
            match self.file.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => {
                    self.seen += n;
                    if self.seen <= self.max_bytes {
                        self.buf.extend_from_slice(&chunk[..n]);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn bytes_seen(&self) -> usize {
        self.seen
    }

    /// Decode the drained bytes. Consumes the receiver and closes the pipe.
    pub fn finish<T: DeserializeOwned>(self) -> Received<T> {
        if self.seen == 0 {
            return Received::Empty;
        }
        if self.seen > self.max_bytes {
            return Received::Oversized(self.seen);
        }
        match serde_json::from_slice(&self.buf) {
            Ok(value) => Received::Value(value),
            Err(e) => Received::Corrupt(e.to_string()),
        }
    }
}
