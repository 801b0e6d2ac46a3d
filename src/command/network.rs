//! ### Network registration and packet domain
use super::NoResponse;
use atat::atat_derive::AtatCmd;

/// GPRS context activation #GPRS
///
/// Answers `#GPRS: <status>`.
#[derive(Clone, AtatCmd)]
#[at_cmd("#GPRS?", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetGprsContextState;

/// GPRS context activation #GPRS
///
/// On activation the module reports the assigned address as
/// `+IP: <address>`.
#[derive(Clone, AtatCmd)]
#[at_cmd("#GPRS", NoResponse, termination = "\r", timeout_ms = 15000)]
pub struct SetGprsContextState {
    #[at_arg(position = 0)]
    pub mode: u8,
}

/// Network registration report +CREG
#[derive(Clone, AtatCmd)]
#[at_cmd("+CREG?", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetNetworkRegistrationStatus;

/// GPRS network registration status +CGREG
#[derive(Clone, AtatCmd)]
#[at_cmd("+CGREG?", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetGprsNetworkRegistrationStatus;

/// EPS network registration status +CEREG
#[derive(Clone, AtatCmd)]
#[at_cmd("+CEREG?", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetEpsNetworkRegistrationStatus;

/// Define PDP context +CGDCONT
#[derive(Clone, AtatCmd)]
#[at_cmd("+CGDCONT", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SetPdpContextDefinition<'a> {
    #[at_arg(position = 0)]
    pub cid: u8,
    #[at_arg(position = 1, len = 6)]
    pub pdp_type: &'a str,
    #[at_arg(position = 2, len = 30)]
    pub apn: &'a str,
}

/// Authentication user ID #USERID
#[derive(Clone, AtatCmd)]
#[at_cmd("#USERID", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SetUserId<'a> {
    #[at_arg(position = 0, len = 30)]
    pub user: &'a str,
}

/// Authentication password #PASSW
#[derive(Clone, AtatCmd)]
#[at_cmd("#PASSW", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SetPassword<'a> {
    #[at_arg(position = 0, len = 30)]
    pub password: &'a str,
}
