//! ### HTTP client
//!
//! Only profile `0` is used.
use super::NoResponse;
use atat::atat_derive::AtatCmd;

/// Configure the HTTP server #HTTPCFG
#[derive(Clone, AtatCmd)]
#[at_cmd("#HTTPCFG", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct SetHttpConfig<'a> {
    #[at_arg(position = 0)]
    pub prof_id: u8,
    #[at_arg(position = 1, len = 64)]
    pub server: &'a str,
    #[at_arg(position = 2)]
    pub port: u16,
}

/// Send a request without body #HTTPQRY
///
/// `command`: `0` GET, `1` HEAD, `2` DELETE.
#[derive(Clone, AtatCmd)]
#[at_cmd("#HTTPQRY", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct HttpQuery<'a> {
    #[at_arg(position = 0)]
    pub prof_id: u8,
    #[at_arg(position = 1)]
    pub command: u8,
    #[at_arg(position = 2, len = 128)]
    pub resource: &'a str,
}

/// Send a request with body #HTTPSND
///
/// `command`: `0` POST, `1` PUT. The module prompts `>>>` for the body.
#[derive(Clone, AtatCmd)]
#[at_cmd("#HTTPSND", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct HttpSend<'a> {
    #[at_arg(position = 0)]
    pub prof_id: u8,
    #[at_arg(position = 1)]
    pub command: u8,
    #[at_arg(position = 2, len = 128)]
    pub resource: &'a str,
    #[at_arg(position = 3)]
    pub data_len: usize,
}

/// Read the response body #HTTPRCV
///
/// The body follows a `<<<` marker.
#[derive(Clone, AtatCmd)]
#[at_cmd("#HTTPRCV", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct HttpReceive {
    #[at_arg(position = 0)]
    pub prof_id: u8,
}
