//! ### Multisocket
//!
//! Telit modules expose six connection identifiers bound to context 1. All
//! commands take the one-based connection id.
pub mod types;

use super::NoResponse;
use atat::atat_derive::AtatCmd;
use types::{ClosureType, ConnectionMode, ListenState, SocketProtocol};

/// Socket status #SS
///
/// Answers `#SS: <connId>,<state>,<locIP>,<locPort>,<remIP>,<remPort>`.
#[derive(Clone, AtatCmd)]
#[at_cmd("#SS", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetSocketStatus {
    #[at_arg(position = 0)]
    pub conn_id: u8,
}

/// Socket status #SS, for every connection id at once
#[derive(Clone, AtatCmd)]
#[at_cmd("#SS", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetAllSocketStatus;

/// Socket info #SI
///
/// Answers `#SI: <connId>,<sent>,<received>,<buff_in>,<ack_waiting>`.
#[derive(Clone, AtatCmd)]
#[at_cmd("#SI", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetSocketInfo {
    #[at_arg(position = 0)]
    pub conn_id: u8,
}

/// Socket configuration #SCFG
#[derive(Clone, AtatCmd)]
#[at_cmd("#SCFG", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct SetSocketConfig {
    #[at_arg(position = 0)]
    pub conn_id: u8,
    #[at_arg(position = 1)]
    pub cid: u8,
    /// Packet size in bytes, `0` for the default
    #[at_arg(position = 2)]
    pub packet_size: u16,
    /// Exchange timeout in seconds
    #[at_arg(position = 3)]
    pub max_timeout: u16,
    /// Connection timeout in hundreds of milliseconds
    #[at_arg(position = 4)]
    pub conn_timeout: u16,
    /// Data sending timeout in hundreds of milliseconds
    #[at_arg(position = 5)]
    pub tx_timeout: u16,
}

/// Socket configuration extended #SCFGEXT
#[derive(Clone, AtatCmd)]
#[at_cmd("#SCFGEXT", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SetSocketConfigExt {
    #[at_arg(position = 0)]
    pub conn_id: u8,
    /// `0`: SRING without data length
    #[at_arg(position = 1)]
    pub sring_mode: u8,
    /// `0`: received data as text
    #[at_arg(position = 2)]
    pub recv_data_mode: u8,
    /// Keep alive timeout in minutes, `0` disables keep alive
    #[at_arg(position = 3)]
    pub keepalive: u8,
}

/// Socket configuration extended 3 #SCFGEXT3
#[derive(Clone, AtatCmd)]
#[at_cmd("#SCFGEXT3", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SetSocketConfigExt3 {
    #[at_arg(position = 0)]
    pub conn_id: u8,
    /// `1`: immediate flush of data sent in command mode
    #[at_arg(position = 1)]
    pub immediate_rsp: u8,
}

/// Socket dial #SD
#[derive(Clone, AtatCmd)]
#[at_cmd("#SD", NoResponse, termination = "\r", timeout_ms = 10000)]
pub struct SocketDial<'a> {
    #[at_arg(position = 0)]
    pub conn_id: u8,
    #[at_arg(position = 1)]
    pub protocol: SocketProtocol,
    #[at_arg(position = 2)]
    pub remote_port: u16,
    #[at_arg(position = 3, len = 64)]
    pub remote_host: &'a str,
    #[at_arg(position = 4)]
    pub closure_type: ClosureType,
    #[at_arg(position = 5)]
    pub local_port: u16,
    #[at_arg(position = 6)]
    pub conn_mode: ConnectionMode,
}

/// Socket listen #SL
#[derive(Clone, AtatCmd)]
#[at_cmd("#SL", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SocketListen {
    #[at_arg(position = 0)]
    pub conn_id: u8,
    #[at_arg(position = 1)]
    pub listen_state: ListenState,
    #[at_arg(position = 2)]
    pub listen_port: u16,
    #[at_arg(position = 3)]
    pub closure_type: ClosureType,
}

/// Socket listen UDP #SLUDP
#[derive(Clone, AtatCmd)]
#[at_cmd("#SLUDP", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SocketListenUdp {
    #[at_arg(position = 0)]
    pub conn_id: u8,
    #[at_arg(position = 1)]
    pub listen_state: ListenState,
    #[at_arg(position = 2)]
    pub listen_port: u16,
}

/// Socket accept #SA
#[derive(Clone, AtatCmd)]
#[at_cmd("#SA", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SocketAccept {
    #[at_arg(position = 0)]
    pub conn_id: u8,
    #[at_arg(position = 1)]
    pub conn_mode: ConnectionMode,
}

/// Send data in command mode extended #SSENDEXT
///
/// The module answers with a `> ` prompt and then expects exactly `length`
/// raw bytes.
#[derive(Clone, AtatCmd)]
#[at_cmd("#SSENDEXT", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SendDataExt {
    #[at_arg(position = 0)]
    pub conn_id: u8,
    #[at_arg(position = 1)]
    pub length: usize,
}

/// Receive data in command mode #SRECV
///
/// Answers `#SRECV: <connId>,<length>` followed by the raw data.
#[derive(Clone, AtatCmd)]
#[at_cmd("#SRECV", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct ReceiveData {
    #[at_arg(position = 0)]
    pub conn_id: u8,
    #[at_arg(position = 1)]
    pub max_bytes: usize,
}

/// Socket shutdown #SH
#[derive(Clone, AtatCmd)]
#[at_cmd("#SH", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct SocketShutdown {
    #[at_arg(position = 0)]
    pub conn_id: u8,
}
