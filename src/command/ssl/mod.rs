//! ### SSL socket
//!
//! The module offers a single SSL connection, connection id `1`.
pub mod types;

use super::NoResponse;
use atat::atat_derive::AtatCmd;
use types::{SecurityDataAction, SecurityDataType};

/// Enable a SSL socket #SSLEN
#[derive(Clone, AtatCmd)]
#[at_cmd("#SSLEN", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SetSslEnable {
    #[at_arg(position = 0)]
    pub ssid: u8,
    #[at_arg(position = 1)]
    pub enable: u8,
}

/// Open a socket SSL to a remote server #SSLD
#[derive(Clone, AtatCmd)]
#[at_cmd("#SSLD", NoResponse, termination = "\r", timeout_ms = 15000)]
pub struct SslDial<'a> {
    #[at_arg(position = 0)]
    pub ssid: u8,
    #[at_arg(position = 1)]
    pub remote_port: u16,
    #[at_arg(position = 2, len = 64)]
    pub remote_host: &'a str,
    /// `0`: close connection when remote host closes
    #[at_arg(position = 3)]
    pub closure_type: u8,
    /// `1`: command mode connection
    #[at_arg(position = 4)]
    pub conn_mode: u8,
}

/// Report the status of a SSL socket #SSLS
///
/// Answers `#SSLS: <ssid>,<state>[,...]`.
#[derive(Clone, AtatCmd)]
#[at_cmd("#SSLS", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetSslStatus {
    #[at_arg(position = 0)]
    pub ssid: u8,
}

/// Close a SSL socket #SSLH
#[derive(Clone, AtatCmd)]
#[at_cmd("#SSLH", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SslShutdown {
    #[at_arg(position = 0)]
    pub ssid: u8,
}

/// Send data through a SSL socket #SSLSEND
///
/// The module answers with a `> ` prompt, the data is terminated by
/// `Ctrl-Z`.
#[derive(Clone, AtatCmd)]
#[at_cmd("#SSLSEND", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SslSend {
    #[at_arg(position = 0)]
    pub ssid: u8,
}

/// Read data from a SSL socket #SSLRECV
///
/// Answers `#SSLRECV: <count>` followed by the data, `TIMEOUT` when
/// nothing arrived, or `DISCONNECTED` when the peer closed.
#[derive(Clone, AtatCmd)]
#[at_cmd("#SSLRECV", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SslReceive {
    #[at_arg(position = 0)]
    pub ssid: u8,
    #[at_arg(position = 1)]
    pub max_bytes: usize,
}

/// Manage the security data #SSLSECDATA
///
/// `size` is only given for [`SecurityDataAction::Store`], the module then
/// prompts with `> ` for the data terminated by `Ctrl-Z`.
#[derive(Clone, AtatCmd)]
#[at_cmd("#SSLSECDATA", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct ManageSecurityData {
    #[at_arg(position = 0)]
    pub ssid: u8,
    #[at_arg(position = 1)]
    pub action: SecurityDataAction,
    #[at_arg(position = 2)]
    pub data_type: SecurityDataType,
    #[at_arg(position = 3)]
    pub size: Option<usize>,
}
