//! Command/response engine.
//!
//! Every exchange with the module goes through a [`Dispatcher`]: it writes a
//! command and then reads the answer one byte at a time into a
//! [`ResponseBuffer`] until the buffered text ends with one of the expected
//! patterns, or the deadline passes. Input read from the transport but not
//! consumed by a match stays staged for the next call, so payload bytes that
//! directly follow a header are never lost.

use atat::AtatCmd;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant, Timer};
use embedded_io_async::{Read, ReadReady, Write};

use crate::buffer::{first_number, ResponseBuffer};
use crate::command::timeout_of;
use crate::error::{Error, ErrorCode};
use crate::fmt::Bytes;
use crate::module_timing::error_code_timeout;

/// Final result code of a successful command
pub const OK: &str = "OK";
/// Start of a numeric error, also matches `+CME ERROR:` and `+CMS ERROR:`
pub const ERROR_CODE: &str = "ERROR:";
/// Error without a numeric code
pub const ERROR: &str = "ERROR\r\n";
pub const CRLF: &str = "\r\n";
/// Ends text and payloads entered after a `>` prompt
pub const CTRL_Z: u8 = 0x1A;
/// Aborts a pending `>` prompt
pub const ESC: u8 = 0x1B;

/// Patterns of a command answering a plain final result code
pub const RESULT_CODES: [&str; 3] = [OK, ERROR_CODE, ERROR];

pub const MAX_PATTERNS: usize = 4;

const CMD_BUF_LEN: usize = 256;
const STAGE_LEN: usize = 64;

pub struct Dispatcher<T, const N: usize> {
    transport: T,
    buffer: ResponseBuffer<N>,
    staged: [u8; STAGE_LEN],
    staged_pos: usize,
    staged_len: usize,
    cmd_buf: [u8; CMD_BUF_LEN],
    last_error: ErrorCode,
}

impl<T, const N: usize> Dispatcher<T, N>
where
    T: Read + Write + ReadReady,
{
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            buffer: ResponseBuffer::new(),
            staged: [0; STAGE_LEN],
            staged_pos: 0,
            staged_len: 0,
            cmd_buf: [0; CMD_BUF_LEN],
            last_error: ErrorCode::default(),
        }
    }

    /// Give back the transport.
    pub fn release(self) -> T {
        self.transport
    }

    pub fn buffer(&self) -> &ResponseBuffer<N> {
        &self.buffer
    }

    /// Text received by the last call, empty if it is not valid UTF-8.
    pub fn response(&self) -> &str {
        self.buffer.as_str().unwrap_or("")
    }

    /// Code stored by the last error decode.
    pub fn last_error(&self) -> ErrorCode {
        self.last_error
    }

    /// Send `cmd` and wait for one of `patterns` within the command's own
    /// timeout. Returns the index of the matched pattern.
    pub async fn send_command<C: AtatCmd>(
        &mut self,
        cmd: &C,
        patterns: &[&str],
    ) -> Result<usize, Error> {
        self.send_command_with_timeout(cmd, patterns, timeout_of(cmd))
            .await
    }

    pub async fn send_command_with_timeout<C: AtatCmd>(
        &mut self,
        cmd: &C,
        patterns: &[&str],
        timeout: Duration,
    ) -> Result<usize, Error> {
        if C::MAX_LEN > CMD_BUF_LEN {
            error!("Command does not fit the command buffer");
            return Err(Error::CommandTooLong);
        }
        let len = cmd.write(&mut self.cmd_buf);
        debug!("Sending command: {:?}", Bytes(&self.cmd_buf[..len]));

        self.discard_input().await?;
        self.buffer.clear();
        self.transport
            .write_all(&self.cmd_buf[..len])
            .await
            .map_err(|_| Error::Transport)?;
        self.transport.flush().await.map_err(|_| Error::Transport)?;

        self.collect(patterns, Instant::now() + timeout).await
    }

    /// Wait for one of `patterns` without writing anything. Staged input is
    /// kept.
    pub async fn wait_for(&mut self, patterns: &[&str], timeout: Duration) -> Result<usize, Error> {
        self.buffer.clear();
        self.collect(patterns, Instant::now() + timeout).await
    }

    /// Like [`Self::send_command_with_timeout`] for bytes that are not a
    /// command: payloads, escape sequences and control characters.
    pub async fn send_raw(
        &mut self,
        data: &[u8],
        patterns: &[&str],
        timeout: Duration,
    ) -> Result<usize, Error> {
        trace!("Sending {} raw bytes", data.len());
        self.discard_input().await?;
        self.buffer.clear();
        self.write_raw(data).await?;
        self.collect(patterns, Instant::now() + timeout).await
    }

    /// Send `data` followed by a single `terminator` byte in one flush.
    pub async fn send_terminated(
        &mut self,
        data: &[u8],
        terminator: u8,
        patterns: &[&str],
        timeout: Duration,
    ) -> Result<usize, Error> {
        trace!("Sending {} raw bytes", data.len());
        self.discard_input().await?;
        self.buffer.clear();
        self.transport
            .write_all(data)
            .await
            .map_err(|_| Error::Transport)?;
        self.write_raw(&[terminator]).await?;
        self.collect(patterns, Instant::now() + timeout).await
    }

    pub async fn write_raw(&mut self, data: &[u8]) -> Result<(), Error> {
        self.transport
            .write_all(data)
            .await
            .map_err(|_| Error::Transport)?;
        self.transport.flush().await.map_err(|_| Error::Transport)
    }

    /// Read exactly `len` bytes into the response buffer.
    pub async fn read_raw(&mut self, len: usize, timeout: Duration) -> Result<&[u8], Error> {
        if len > N {
            return Err(Error::BadLength);
        }
        self.buffer.clear();
        let deadline = Instant::now() + timeout;
        while self.buffer.len() < len {
            match self.next_byte(deadline).await? {
                Some(byte) => self.buffer.push(byte),
                None => {
                    warn!("Expected {} bytes, got {}", len, self.buffer.len());
                    return Err(Error::BadLength);
                }
            }
        }
        Ok(self.buffer.as_bytes())
    }

    /// Send `cmd` and map its final result code.
    pub async fn expect_ok<C: AtatCmd>(&mut self, cmd: &C) -> Result<(), Error> {
        self.expect_ok_with_timeout(cmd, timeout_of(cmd)).await
    }

    pub async fn expect_ok_with_timeout<C: AtatCmd>(
        &mut self,
        cmd: &C,
        timeout: Duration,
    ) -> Result<(), Error> {
        let index = self
            .send_command_with_timeout(cmd, &RESULT_CODES, timeout)
            .await?;
        self.result_code(RESULT_CODES[index]).await
    }

    /// `Ok` for [`OK`], the decoded failure otherwise.
    pub async fn result_code(&mut self, matched: &str) -> Result<(), Error> {
        if matched == OK {
            Ok(())
        } else {
            Err(self.failure(matched).await)
        }
    }

    /// Turn a matched error pattern into an [`Error`], decoding the numeric
    /// code where there is one.
    pub async fn failure(&mut self, matched: &str) -> Error {
        match matched {
            ERROR_CODE => Error::Code(self.decode_error().await),
            ERROR => {
                self.last_error = ErrorCode::MESSAGE;
                Error::Message
            }
            _ => Error::Unexpected,
        }
    }

    /// Parse the code following an already matched [`ERROR_CODE`].
    pub async fn decode_error(&mut self) -> ErrorCode {
        let code = match self.wait_for(&[CRLF], error_code_timeout()).await {
            Ok(_) => self
                .buffer
                .as_str()
                .and_then(|s| first_number::<u16>(s, " \r\n"))
                .map(ErrorCode)
                .unwrap_or(ErrorCode::MESSAGE),
            Err(_) => ErrorCode::TIMEOUT,
        };
        warn!("Module error {}: {}", code.value(), code.description());
        self.last_error = code;
        code
    }

    async fn collect(&mut self, patterns: &[&str], deadline: Instant) -> Result<usize, Error> {
        debug_assert!(patterns.len() <= MAX_PATTERNS);
        loop {
            let Some(byte) = self.next_byte(deadline).await? else {
                trace!("Timeout, received {:?}", Bytes(self.buffer.as_bytes()));
                return Err(Error::Timeout);
            };
            self.buffer.push(byte);
            if let Some(index) = patterns
                .iter()
                .position(|p| self.buffer.ends_with(p.as_bytes()))
            {
                trace!("Matched {:?}", Bytes(self.buffer.as_bytes()));
                return Ok(index);
            }
        }
    }

    /// Next input byte, `None` once `deadline` has passed.
    async fn next_byte(&mut self, deadline: Instant) -> Result<Option<u8>, Error> {
        if self.staged_pos == self.staged_len {
            if Instant::now() >= deadline {
                return Ok(None);
            }
            match select(self.transport.read(&mut self.staged), Timer::at(deadline)).await {
                Either::First(Ok(0)) | Either::First(Err(_)) => {
                    error!("Transport read failed");
                    return Err(Error::Transport);
                }
                Either::First(Ok(n)) => {
                    self.staged_pos = 0;
                    self.staged_len = n;
                }
                Either::Second(()) => return Ok(None),
            }
        }
        let byte = self.staged[self.staged_pos];
        self.staged_pos += 1;
        Ok(Some(byte))
    }

    async fn discard_input(&mut self) -> Result<(), Error> {
        if self.staged_pos < self.staged_len {
            trace!(
                "Discarding {:?}",
                Bytes(&self.staged[self.staged_pos..self.staged_len])
            );
        }
        self.staged_pos = 0;
        self.staged_len = 0;
        while self.transport.read_ready().map_err(|_| Error::Transport)? {
            let n = self
                .transport
                .read(&mut self.staged)
                .await
                .map_err(|_| Error::Transport)?;
            if n == 0 {
                break;
            }
            trace!("Discarding {:?}", Bytes(&self.staged[..n]));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::general::GetSignalQuality;
    use crate::command::network::GetGprsContextState;
    use crate::test_helpers::MockTransport;

    type TestDispatcher = Dispatcher<MockTransport, 256>;

    #[tokio::test]
    async fn returns_index_of_matched_pattern() {
        let mock = MockTransport::new(&["\r\n#GPRS: 0\r\n\r\nOK\r\n"]);
        let mut dispatcher = TestDispatcher::new(mock);

        let index = dispatcher
            .send_command(&GetGprsContextState, &["GPRS: 1", "GPRS: 0"])
            .await
            .unwrap();

        assert_eq!(index, 1);
        assert_eq!(dispatcher.buffer().len(), "\r\n#GPRS: 0".len());
        assert_eq!(dispatcher.response(), "\r\n#GPRS: 0");
        assert_eq!(dispatcher.release().written(), b"AT#GPRS?\r");
    }

    #[tokio::test]
    async fn earlier_pattern_wins_on_the_same_byte() {
        let mock = MockTransport::new(&["\r\n+CME ERROR: 10\r\n"]);
        let mut dispatcher = TestDispatcher::new(mock);

        let index = dispatcher
            .send_command(&GetSignalQuality, &["ERROR: 1", "ERROR:", "+CME ERROR:"])
            .await;

        assert_eq!(index, Ok(1));
    }

    #[tokio::test]
    async fn times_out_without_match() {
        let mock = MockTransport::new(&["\r\nsomething else\r\n"]);
        let mut dispatcher = TestDispatcher::new(mock);

        let timeout = Duration::from_millis(100);
        let start = Instant::now();
        let res = dispatcher
            .send_command_with_timeout(&GetSignalQuality, &[OK], timeout)
            .await;
        let elapsed = start.elapsed();

        assert_eq!(res, Err(Error::Timeout));
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(200));
    }

    #[tokio::test]
    async fn overflow_still_matches() {
        let mut reply = std::string::String::new();
        for _ in 0..100 {
            reply.push('x');
        }
        reply.push_str("\r\nOK\r\n");
        let mock = MockTransport::new(&[reply.as_str()]);
        let mut dispatcher = Dispatcher::<_, 16>::new(mock);

        let res = dispatcher.send_command(&GetSignalQuality, &[OK]).await;

        assert_eq!(res, Ok(0));
        assert!(dispatcher.buffer().overflowed());
        assert_eq!(dispatcher.buffer().len(), 16);
        assert!(dispatcher.buffer().ends_with(b"xxxx\r\nOK"));
    }

    #[tokio::test]
    async fn decodes_numeric_error() {
        let mock = MockTransport::new(&["\r\n+CME ERROR: 555\r\n"]);
        let mut dispatcher = TestDispatcher::new(mock);

        let res = dispatcher.expect_ok(&GetSignalQuality).await;

        assert_eq!(res, Err(Error::Code(ErrorCode(555))));
        assert_eq!(dispatcher.last_error(), ErrorCode(555));
    }

    #[tokio::test]
    async fn generic_error_stores_message() {
        let mock = MockTransport::new(&["\r\n+CME ERROR: 10\r\n", "\r\nERROR\r\n"]);
        let mut dispatcher = TestDispatcher::new(mock);

        let _ = dispatcher.expect_ok(&GetSignalQuality).await;
        assert_eq!(dispatcher.last_error(), ErrorCode(10));

        let res = dispatcher.expect_ok(&GetSignalQuality).await;
        assert_eq!(res, Err(Error::Message));
        assert_eq!(dispatcher.last_error(), ErrorCode::MESSAGE);
    }

    #[tokio::test]
    async fn unparsable_error_stores_message() {
        let mock = MockTransport::new(&["\r\n+CME ERROR: SIM busy\r\n"]);
        let mut dispatcher = TestDispatcher::new(mock);

        let res = dispatcher.expect_ok(&GetSignalQuality).await;

        assert_eq!(res, Err(Error::Code(ErrorCode::MESSAGE)));
        assert_eq!(dispatcher.last_error(), ErrorCode::MESSAGE);
    }

    #[tokio::test]
    async fn truncated_error_stores_timeout() {
        let mock = MockTransport::new(&["\r\n+CME ERROR: 55"]);
        let mut dispatcher = TestDispatcher::new(mock);

        let res = dispatcher.expect_ok(&GetSignalQuality).await;

        assert_eq!(res, Err(Error::Code(ErrorCode::TIMEOUT)));
        assert_eq!(dispatcher.last_error(), ErrorCode::TIMEOUT);
    }

    #[tokio::test]
    async fn bytes_after_match_stay_staged() {
        let mock = MockTransport::new(&["\r\n#SRECV: 1,5\r\nhello\r\n\r\nOK\r\n"]);
        let mut dispatcher = TestDispatcher::new(mock);

        let res = dispatcher
            .send_command(&GetSignalQuality, &["#SRECV: 1,"])
            .await;
        assert_eq!(res, Ok(0));
        dispatcher
            .wait_for(&[CRLF], Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(dispatcher.response(), "5\r\n");

        let data = dispatcher
            .read_raw(5, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn short_raw_read_is_bad_length() {
        let mock = MockTransport::new(&["\r\n#SRECV: 1,5\r\nhel"]);
        let mut dispatcher = TestDispatcher::new(mock);

        dispatcher
            .send_command(&GetSignalQuality, &[CRLF])
            .await
            .unwrap();
        dispatcher
            .wait_for(&[CRLF], Duration::from_millis(100))
            .await
            .unwrap();

        let res = dispatcher.read_raw(5, Duration::from_millis(50)).await;
        assert_eq!(res, Err(Error::BadLength));
    }

    #[tokio::test]
    async fn stale_input_is_discarded_before_a_command() {
        let mock = MockTransport::new(&["\r\nOK\r\n", "\r\n+CSQ: 17,0\r\n\r\nOK\r\n"]);
        let mut dispatcher = TestDispatcher::new(mock);

        dispatcher
            .send_command(&GetSignalQuality, &["\r\n"])
            .await
            .unwrap();
        let res = dispatcher.send_command(&GetSignalQuality, &[OK]).await;

        assert_eq!(res, Ok(0));
        assert!(dispatcher.response().contains("+CSQ: 17,0"));
    }
}
