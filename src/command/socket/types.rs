//! Argument types used by the socket commands
use atat::atat_derive::AtatEnum;

/// Transmission protocol of a socket dial or listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketProtocol {
    Tcp = 0,
    Udp = 1,
}

/// Connection closure behaviour of `#SD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
pub enum ClosureType {
    /// Local host closes immediately when the remote host has closed
    Immediate = 0,
    /// Local host closes after an escape sequence
    AfterEscape = 255,
}

/// Connection mode of `#SD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
pub enum ConnectionMode {
    Online = 0,
    Command = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
pub enum ListenState {
    Stop = 0,
    Start = 1,
}
