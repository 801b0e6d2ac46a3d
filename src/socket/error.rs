use crate::connection::ConnectionError;
use crate::error::Error;

use super::types::{SocketState, SslState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpenError {
    Connection(ConnectionError),
    Status(Error),
    /// The socket must be closed before it is opened
    NotClosed(SocketState),
    ConfigExt(Error),
    ConfigExt3(Error),
    /// `#SD`, `#SL` or `#SLUDP` was refused
    Dial(Error),
    Timeout,
}

impl OpenError {
    pub fn code(&self) -> u8 {
        match self {
            // an invalid address would collide with the status failure
            Self::Connection(ConnectionError::IpAddress) => 15,
            Self::Connection(e) => e.code(),
            Self::Status(_) => 16,
            Self::NotClosed(state) => *state as u8 + 16,
            Self::ConfigExt(_) => 22,
            Self::ConfigExt3(_) => 23,
            Self::Dial(_) => 24,
            Self::Timeout => 25,
        }
    }
}

impl From<ConnectionError> for OpenError {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
    Status(Error),
    /// The socket is not connected
    InvalidState,
    Prompt(Error),
    Payload(Error),
    /// Status query failed while waiting for the data to leave
    Flush(Error),
    Timeout,
}

impl SendError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Status(_) => 1,
            Self::InvalidState => 2,
            Self::Prompt(_) => 3,
            Self::Payload(_) => 4,
            Self::Flush(_) => 5,
            Self::Timeout => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReceiveError {
    /// Nothing arrived before the timeout, or the counters could not be read
    NoData,
    Request(Error),
    /// Malformed `#SRECV` byte count
    Header,
    BadLength,
}

impl ReceiveError {
    pub fn code(&self) -> u8 {
        match self {
            Self::NoData => 1,
            Self::Request(_) => 2,
            Self::Header => 3,
            Self::BadLength => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CloseError {
    /// `#SH`, `#SSLH` or the listen/enable switch was refused
    Shutdown(Error),
    Status(Error),
    Timeout,
}

impl CloseError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Shutdown(_) => 1,
            Self::Status(_) => 2,
            Self::Timeout => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SslError {
    Connection(ConnectionError),
    Status(Error),
    NotClosed(SslState),
    Dial(Error),
    Timeout,
}

impl SslError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Connection(ConnectionError::IpAddress) => 15,
            Self::Connection(e) => e.code(),
            Self::Status(_) => 16,
            Self::NotClosed(state) => *state as u8 + 16,
            Self::Dial(_) => 19,
            Self::Timeout => 20,
        }
    }
}

impl From<ConnectionError> for SslError {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SslReceiveError {
    /// The module kept answering `TIMEOUT` until the deadline, or did not
    /// answer at all
    NoData,
    Disconnected,
    Module(Error),
    Header,
    BadLength,
}

impl SslReceiveError {
    pub fn code(&self) -> u8 {
        match self {
            Self::NoData => 1,
            Self::Disconnected => 2,
            Self::Module(_) => 3,
            Self::Header => 4,
            Self::BadLength => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityDataError {
    Prompt(Error),
    Store(Error),
    Read(Error),
    Delete(Error),
    /// Storing requires data
    MissingData,
}

impl SecurityDataError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Prompt(_) => 2,
            Self::Store(_) => 3,
            Self::Read(_) => 4,
            Self::Delete(_) => 5,
            Self::MissingData => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcceptError {
    Status(Error),
    Accept(Error),
    /// No peer connected before the timeout
    NothingPending,
}

impl AcceptError {
    pub fn code(&self) -> u8 {
        1
    }
}
