//! ### FTP client
use super::NoResponse;
use atat::atat_derive::AtatCmd;

/// Open a FTP connection #FTPOPEN
///
/// `server` carries the port, `<host>:<port>`.
#[derive(Clone, AtatCmd)]
#[at_cmd("#FTPOPEN", NoResponse, termination = "\r", timeout_ms = 15000)]
pub struct FtpOpen<'a> {
    #[at_arg(position = 0, len = 70)]
    pub server: &'a str,
    #[at_arg(position = 1, len = 30)]
    pub username: &'a str,
    #[at_arg(position = 2, len = 30)]
    pub password: &'a str,
    /// `1`: passive mode
    #[at_arg(position = 3)]
    pub mode: u8,
}

/// Select the transfer type #FTPTYPE, `0` binary, `1` ascii
#[derive(Clone, AtatCmd)]
#[at_cmd("#FTPTYPE", NoResponse, termination = "\r", timeout_ms = 15000)]
pub struct SetFtpType {
    #[at_arg(position = 0)]
    pub kind: u8,
}

/// Close the FTP connection #FTPCLOSE
#[derive(Clone, AtatCmd)]
#[at_cmd("#FTPCLOSE", NoResponse, termination = "\r", timeout_ms = 10000)]
pub struct FtpClose;

/// Store a file on the server #FTPPUT
///
/// With `mode = 0` the module switches to online mode and answers
/// `CONNECT`. The upload ends with the `+++` escape sequence.
#[derive(Clone, AtatCmd)]
#[at_cmd("#FTPPUT", NoResponse, termination = "\r", timeout_ms = 15000)]
pub struct FtpPut<'a> {
    #[at_arg(position = 0, len = 100)]
    pub filename: &'a str,
    #[at_arg(position = 1)]
    pub mode: u8,
}

/// Size of a remote file #FTPFSIZE
///
/// Answers `#FTPFSIZE: <size>`.
#[derive(Clone, AtatCmd)]
#[at_cmd("#FTPFSIZE", NoResponse, termination = "\r", timeout_ms = 15000)]
pub struct GetFtpFileSize<'a> {
    #[at_arg(position = 0, len = 100)]
    pub filename: &'a str,
}

/// Start a packet mode download #FTPGETPKT
#[derive(Clone, AtatCmd)]
#[at_cmd("#FTPGETPKT", NoResponse, termination = "\r", timeout_ms = 60000)]
pub struct FtpGetPacket<'a> {
    #[at_arg(position = 0, len = 100)]
    pub filename: &'a str,
}

/// Read the next downloaded packet #FTPRECV
///
/// Answers `#FTPRECV: <count>` followed by the data.
#[derive(Clone, AtatCmd)]
#[at_cmd("#FTPRECV", NoResponse, termination = "\r", timeout_ms = 15000)]
pub struct FtpReceive {
    #[at_arg(position = 0)]
    pub max_bytes: usize,
}
