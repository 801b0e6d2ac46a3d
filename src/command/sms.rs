//! ### Short messages, text mode
use super::NoResponse;
use atat::atat_derive::AtatCmd;

/// Select the message format +CMGF, `1` text
#[derive(Clone, AtatCmd)]
#[at_cmd("+CMGF", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SetMessageFormat {
    #[at_arg(position = 0)]
    pub mode: u8,
}

/// Use the SIM for reading, writing and receiving +CPMS="SM","SM","SM"
#[derive(Clone, AtatCmd)]
#[at_cmd(
    "+CPMS=\"SM\",\"SM\",\"SM\"",
    NoResponse,
    value_sep = false,
    termination = "\r",
    timeout_ms = 5000
)]
pub struct SetSimMessageStorage;

/// New message indication +CNMI=2,1,0,0,0
///
/// Incoming messages are stored and announced with `+CMTI: "SM",<index>`.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CNMI", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SetNewMessageIndication {
    #[at_arg(position = 0)]
    pub mode: u8,
    #[at_arg(position = 1)]
    pub mt: u8,
    #[at_arg(position = 2)]
    pub bm: u8,
    #[at_arg(position = 3)]
    pub ds: u8,
    #[at_arg(position = 4)]
    pub bfr: u8,
}

/// Send a message +CMGS, the module prompts `>` for the text
#[derive(Clone, AtatCmd)]
#[at_cmd("+CMGS", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SendMessage<'a> {
    #[at_arg(position = 0, len = 20)]
    pub number: &'a str,
}

/// Read a message +CMGR
#[derive(Clone, AtatCmd)]
#[at_cmd("+CMGR", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct ReadMessage {
    #[at_arg(position = 0)]
    pub index: u16,
}

/// List messages +CMGL
#[derive(Clone, AtatCmd)]
#[at_cmd("+CMGL", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct ListMessages<'a> {
    /// `"REC UNREAD"`, `"REC READ"`, `"ALL"`, ...
    #[at_arg(position = 0, len = 12)]
    pub stat: &'a str,
}

/// Delete a message +CMGD
#[derive(Clone, AtatCmd)]
#[at_cmd("+CMGD", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct DeleteMessage {
    #[at_arg(position = 0)]
    pub index: u16,
    /// `0` only `index`, `1` all read, `4` all messages
    #[at_arg(position = 1)]
    pub flag: u8,
}
