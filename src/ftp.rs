//! FTP client of the module.
//!
//! A session is opened once with [`Ftp::open_session`]. Uploads go through
//! online mode, the file is streamed as is and the transfer ends with the
//! `+++` escape sequence. Downloads use packet mode, pulling the file in
//! chunks of at most [`MAX_DL_PAYLOAD`](crate::socket::MAX_DL_PAYLOAD) bytes.

use core::fmt::Write as _;

use embassy_time::{Duration, Timer};
use embedded_io_async::{Read, ReadReady, Seek, SeekFrom, Write};
use heapless::String;

use crate::buffer::{first_number, line_after};
use crate::command::ftp::{
    FtpClose, FtpGetPacket, FtpOpen, FtpPut, FtpReceive, GetFtpFileSize, SetFtpType,
};
use crate::config::Config;
use crate::connection::{Connection, ConnectionError, NetworkState};
use crate::dispatcher::{Dispatcher, CRLF, ERROR, ERROR_CODE};
use crate::error::Error;
use crate::module_timing::{payload_ack_timeout, payload_timeout, prompt_timeout};
use crate::socket::MAX_DL_PAYLOAD;

/// Bytes written per chunk while uploading
const UL_CHUNK: usize = 500;
const MAX_READ_RETRIES: usize = 5;
const MAX_CLOSE_RETRIES: usize = 4;
const MAX_ESCAPE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError {
    Connection(ConnectionError),
    Open(Error),
    /// Selecting the binary transfer type failed
    Type(Error),
}

impl SessionError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Connection(ConnectionError::IpAddress) => 15,
            Self::Connection(e) => e.code(),
            Self::Open(_) => 16,
            Self::Type(_) => 17,
        }
    }
}

impl From<ConnectionError> for SessionError {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FtpCloseError(pub Error);

impl FtpCloseError {
    pub fn code(&self) -> u8 {
        match self.0 {
            Error::Code(_) => 1,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UploadError {
    /// The local file could not be measured
    Measure,
    Rewind,
    /// `#FTPPUT` did not reach online mode
    Put(Error),
    /// The module did not leave online mode
    Escape(Error),
    /// Reading the local file or writing to the module failed
    Stream(Error),
}

impl UploadError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Measure => 3,
            Self::Rewind => 4,
            Self::Put(_) => 6,
            Self::Escape(_) => 7,
            Self::Stream(_) => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DownloadError {
    FileSize(Error),
    Rewind,
    GetPacket(Error),
    /// The module answered `#FTPRECV` with an error code
    Receive(Error),
    Header,
    BadLength,
    /// Writing the local file failed
    Write,
    /// The local file does not end up with the remote size
    SizeMismatch,
    RetriesExhausted,
}

impl DownloadError {
    pub fn code(&self) -> u8 {
        match self {
            Self::FileSize(_) => 1,
            Self::Rewind => 5,
            Self::GetPacket(_) => 6,
            Self::Receive(_) => 7,
            Self::Header => 8,
            Self::BadLength => 9,
            Self::Write => 10,
            Self::SizeMismatch => 11,
            Self::RetriesExhausted => 12,
        }
    }
}

pub struct Ftp<'a, T, const N: usize> {
    dispatcher: &'a mut Dispatcher<T, N>,
    config: &'a Config,
    network: &'a mut NetworkState,
}

impl<'a, T, const N: usize> Ftp<'a, T, N>
where
    T: Read + Write + ReadReady,
{
    pub(crate) fn new(
        dispatcher: &'a mut Dispatcher<T, N>,
        config: &'a Config,
        network: &'a mut NetworkState,
    ) -> Self {
        Self {
            dispatcher,
            config,
            network,
        }
    }

    /// Log in to `server` in passive mode and select binary transfers.
    pub async fn open_session(
        &mut self,
        server: &str,
        port: u16,
        user: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        let budget = self.config.timing.data_connection_budget;
        Connection::new(self.dispatcher, self.config, self.network)
            .check_data_connection(budget)
            .await?;

        let mut address: String<70> = String::new();
        write!(address, "{}:{}", server, port)
            .map_err(|_| SessionError::Open(Error::CommandTooLong))?;

        debug!("[FTP] opening session to {}", address.as_str());
        self.dispatcher
            .expect_ok(&FtpOpen {
                server: &address,
                username: user,
                password,
                mode: 1,
            })
            .await
            .map_err(SessionError::Open)?;

        Timer::after(self.config.timing.ftp_settle).await;
        self.dispatcher
            .expect_ok(&SetFtpType { kind: 0 })
            .await
            .map_err(SessionError::Type)
    }

    pub async fn close_session(&mut self) -> Result<(), FtpCloseError> {
        Timer::after(self.config.timing.retry_pause).await;

        let mut res = self.dispatcher.expect_ok(&FtpClose).await;
        for _ in 0..MAX_CLOSE_RETRIES {
            if res.is_ok() {
                break;
            }
            Timer::after(self.config.timing.retry_pause * 2).await;
            res = self.dispatcher.expect_ok(&FtpClose).await;
        }
        res.map_err(FtpCloseError)
    }

    /// Size in bytes of a file on the server.
    pub async fn file_size(&mut self, remote: &str) -> Result<usize, Error> {
        self.dispatcher
            .expect_ok(&GetFtpFileSize { filename: remote })
            .await?;
        line_after(self.dispatcher.response(), "#FTPFSIZE: ")
            .and_then(|s| s.trim().parse().ok())
            .ok_or(Error::Parse)
    }

    /// Store the whole of `local` as `remote`. Returns the number of bytes
    /// sent.
    pub async fn upload<F>(&mut self, remote: &str, local: &mut F) -> Result<usize, UploadError>
    where
        F: Read + Seek,
    {
        let size = local
            .seek(SeekFrom::End(0))
            .await
            .map_err(|_| UploadError::Measure)?;
        local
            .seek(SeekFrom::Start(0))
            .await
            .map_err(|_| UploadError::Rewind)?;
        debug!("[FTP] uploading {} bytes to {}", size, remote);

        Timer::after(self.config.timing.retry_pause).await;

        let patterns = ["CONNECT", "NO CARRIER", ERROR_CODE, ERROR];
        let index = self
            .dispatcher
            .send_command(
                &FtpPut {
                    filename: remote,
                    mode: 0,
                },
                &patterns,
            )
            .await
            .map_err(UploadError::Put)?;
        if index != 0 {
            return Err(UploadError::Put(
                self.dispatcher.failure(patterns[index]).await,
            ));
        }

        let mut chunk = [0u8; UL_CHUNK];
        let mut sent = 0;
        let mut stream_error = None;
        loop {
            let n = match read_retrying(local, &mut chunk).await {
                Ok(n) => n,
                Err(e) => {
                    stream_error = Some(e);
                    break;
                }
            };
            if n == 0 {
                break;
            }
            if let Err(e) = self.dispatcher.write_raw(&chunk[..n]).await {
                stream_error = Some(e);
                break;
            }
            sent += n;
        }

        // online mode has to be left on every path
        Timer::after(self.config.timing.ftp_settle).await;
        let mut escape = Err(Error::Timeout);
        for _ in 0..MAX_ESCAPE_ATTEMPTS {
            escape = self
                .dispatcher
                .send_raw(b"+++", &["NO CARRIER"], payload_ack_timeout())
                .await;
            if escape.is_ok() {
                break;
            }
        }

        if let Some(e) = stream_error {
            warn!("[FTP] upload aborted after {} bytes", sent);
            return Err(UploadError::Stream(e));
        }
        escape.map_err(UploadError::Escape)?;

        info!("[FTP] uploaded {} bytes", sent);
        Ok(sent)
    }

    /// Fetch `remote` into `local`. Returns the number of bytes received.
    pub async fn download<F>(&mut self, remote: &str, local: &mut F) -> Result<usize, DownloadError>
    where
        F: Write + Seek,
    {
        let size = self
            .file_size(remote)
            .await
            .map_err(DownloadError::FileSize)?;
        local
            .seek(SeekFrom::Start(0))
            .await
            .map_err(|_| DownloadError::Rewind)?;

        self.dispatcher
            .expect_ok(&FtpGetPacket { filename: remote })
            .await
            .map_err(DownloadError::GetPacket)?;

        let delay = packet_delay(size);
        debug!("[FTP] downloading {} bytes from {}", size, remote);

        let patterns = ["#FTPRECV: ", ERROR_CODE, ERROR];
        let mut total = 0;
        let mut retries = 0;
        while total < size {
            Timer::after(delay).await;

            let cmd = FtpReceive {
                max_bytes: (size - total).min(MAX_DL_PAYLOAD),
            };
            match self.dispatcher.send_command(&cmd, &patterns).await {
                Ok(0) => {}
                Ok(1) => {
                    return Err(DownloadError::Receive(
                        self.dispatcher.failure(ERROR_CODE).await,
                    ))
                }
                _ => {
                    retries += 1;
                    if retries > MAX_READ_RETRIES {
                        return Err(DownloadError::RetriesExhausted);
                    }
                    Timer::after(self.config.timing.retry_pause).await;
                    continue;
                }
            }

            self.dispatcher
                .wait_for(&[CRLF], prompt_timeout())
                .await
                .map_err(|_| DownloadError::Header)?;
            let count: usize =
                first_number(self.dispatcher.response(), " \r\n").ok_or(DownloadError::Header)?;
            if count == 0 {
                retries += 1;
                if retries > MAX_READ_RETRIES {
                    return Err(DownloadError::RetriesExhausted);
                }
                Timer::after(self.config.timing.retry_pause).await;
                continue;
            }

            let data = self
                .dispatcher
                .read_raw(count, payload_timeout())
                .await
                .map_err(|_| DownloadError::BadLength)?;
            local
                .write_all(data)
                .await
                .map_err(|_| DownloadError::Write)?;
            total += count;
            trace!("[FTP] {}/{} bytes", total, size);
        }

        let written = local
            .seek(SeekFrom::Current(0))
            .await
            .map_err(|_| DownloadError::Write)?;
        if written != size as u64 {
            warn!("[FTP] wrote {} bytes, expected {}", written, size);
            return Err(DownloadError::SizeMismatch);
        }
        info!("[FTP] downloaded {} bytes", total);
        Ok(total)
    }
}

/// Read the next chunk of `local`, retrying failed reads.
async fn read_retrying<F: Read>(local: &mut F, buf: &mut [u8]) -> Result<usize, Error> {
    let mut retries = 0;
    loop {
        match local.read(buf).await {
            Ok(n) => return Ok(n),
            Err(_) if retries < MAX_READ_RETRIES => {
                retries += 1;
                warn!("[FTP] local read failed, retry {}", retries);
            }
            Err(_) => return Err(Error::File),
        }
    }
}

/// Pause before each packet request, longer for bigger files.
fn packet_delay(size: usize) -> Duration {
    let ms = if size > 50_000 {
        500
    } else if size > 25_000 {
        size / 100
    } else {
        size / 160
    };
    Duration::from_millis(ms as u64)
}
