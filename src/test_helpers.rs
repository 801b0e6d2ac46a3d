//! Scripted stand-ins for the serial link and for local files.
extern crate std;

use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use embassy_time::Duration;
use embedded_io_async::{ErrorKind, ErrorType, Read, ReadReady, Seek, SeekFrom, Write};

use crate::config::{Config, Timing};

/// Serial link answering each flush with the next scripted reply.
///
/// A reply becomes readable when the host flushes, which is what a module
/// does: it answers once it has received a command. Reads block while
/// nothing is readable.
pub struct MockTransport {
    replies: VecDeque<Vec<u8>>,
    readable: VecDeque<u8>,
    written: Vec<u8>,
    pending_write: Vec<u8>,
    flushes: Vec<Vec<u8>>,
}

impl MockTransport {
    pub fn new(replies: &[&str]) -> Self {
        let mut mock = Self {
            replies: VecDeque::new(),
            readable: VecDeque::new(),
            written: Vec::new(),
            pending_write: Vec::new(),
            flushes: Vec::new(),
        };
        for reply in replies {
            mock.push_reply(reply.as_bytes());
        }
        mock
    }

    pub fn push_reply(&mut self, reply: &[u8]) {
        self.replies.push_back(reply.to_vec());
    }

    /// Make bytes readable without waiting for a flush.
    pub fn push_unsolicited(&mut self, data: &[u8]) {
        self.readable.extend(data.iter().copied());
    }

    /// Every byte the host wrote.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// The host writes, split at each flush.
    pub fn flushes(&self) -> Vec<String> {
        self.flushes
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect()
    }

    /// Flushed writes that look like AT commands.
    pub fn commands(&self) -> Vec<String> {
        self.flushes()
            .into_iter()
            .filter(|f| f.starts_with("AT"))
            .collect()
    }

    pub fn replies_left(&self) -> usize {
        self.replies.len()
    }
}

impl ErrorType for MockTransport {
    type Error = ErrorKind;
}

impl Read for MockTransport {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.readable.is_empty() {
            core::future::pending::<()>().await;
        }
        let n = buf.len().min(self.readable.len());
        for (slot, byte) in buf.iter_mut().zip(self.readable.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl ReadReady for MockTransport {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.readable.is_empty())
    }
}

impl Write for MockTransport {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.written.extend_from_slice(buf);
        self.pending_write.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.flushes.push(core::mem::take(&mut self.pending_write));
        if let Some(reply) = self.replies.pop_front() {
            self.readable.extend(reply);
        }
        Ok(())
    }
}

/// In-memory file with an optional number of failing reads, and of writes
/// that report success but store nothing.
#[derive(Default)]
pub struct MockFile {
    pub data: Vec<u8>,
    pos: usize,
    pub failing_reads: usize,
    pub dropped_writes: usize,
}

impl MockFile {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
            failing_reads: 0,
            dropped_writes: 0,
        }
    }
}

impl ErrorType for MockFile {
    type Error = ErrorKind;
}

impl Read for MockFile {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(ErrorKind::Other);
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for MockFile {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.dropped_writes > 0 {
            self.dropped_writes -= 1;
            return Ok(buf.len());
        }
        let end = self.pos + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(buf.len())
    }
}

impl Seek for MockFile {
    async fn seek(&mut self, pos: SeekFrom) -> Result<u64, Self::Error> {
        let new = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(off) => self.data.len() as i64 + off,
            SeekFrom::Current(off) => self.pos as i64 + off,
        };
        if new < 0 {
            return Err(ErrorKind::InvalidInput);
        }
        self.pos = new as usize;
        Ok(new as u64)
    }
}

/// Timing with every interval shrunk so tests run in milliseconds.
pub fn fast_timing() -> Timing {
    Timing {
        data_connection_budget: Duration::from_millis(200),
        registration_poll: Duration::from_millis(5),
        eps_poll: Duration::from_millis(5),
        socket_poll: Duration::from_millis(5),
        socket_ceiling: Duration::from_millis(100),
        receive_poll: Duration::from_millis(5),
        accept_poll: Duration::from_millis(5),
        gps_poll: Duration::from_millis(5),
        gps_hdop_poll: Duration::from_millis(5),
        retry_pause: Duration::from_millis(5),
        ssl_close_pause: Duration::from_millis(5),
        ftp_settle: Duration::from_millis(5),
    }
}

pub fn test_config() -> Config {
    Config::new()
        .with_apn("internet", "", "")
        .with_timing(fast_timing())
}
