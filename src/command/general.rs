//! ### General configuration, identification and status
use super::NoResponse;
use atat::atat_derive::AtatCmd;

/// Report mobile equipment error +CMEE
///
/// `1` selects numeric `+CME ERROR: <err>` result codes.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CMEE", NoResponse, termination = "\r", timeout_ms = 500)]
pub struct SetReportMobileTerminationError {
    #[at_arg(position = 0)]
    pub n: u8,
}

/// Command echo E
#[derive(Clone, AtatCmd)]
#[at_cmd("E0", NoResponse, termination = "\r", timeout_ms = 500)]
pub struct DisableEcho;

/// Software shutdown #SHDN
#[derive(Clone, AtatCmd)]
#[at_cmd("#SHDN", NoResponse, termination = "\r", timeout_ms = 1000)]
pub struct Shutdown;

/// Enter PIN +CPIN
#[derive(Clone, AtatCmd)]
#[at_cmd("+CPIN?", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct GetPinStatus;

/// Enter PIN +CPIN
///
/// If the SIM is waiting for the PUK, `pin` is the PUK and `new_pin`
/// replaces the old PIN.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CPIN", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SetPin<'a> {
    #[at_arg(position = 0, len = 16)]
    pub pin: &'a str,
    #[at_arg(position = 1, len = 16)]
    pub new_pin: Option<&'a str>,
}

/// Signal quality +CSQ
#[derive(Clone, AtatCmd)]
#[at_cmd("+CSQ", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetSignalQuality;

/// Packet service network type #PSNT
#[derive(Clone, AtatCmd)]
#[at_cmd("#PSNT?", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetNetworkType;

/// Operator selection +COPS
#[derive(Clone, AtatCmd)]
#[at_cmd("+COPS?", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetOperatorSelection;

/// Hardware revision #HWREV
#[derive(Clone, AtatCmd)]
#[at_cmd("#HWREV", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetHardwareRevision;

/// Manufacturer identification #CGMI
#[derive(Clone, AtatCmd)]
#[at_cmd("#CGMI", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetManufacturerId;

/// Model identification #CGMM
#[derive(Clone, AtatCmd)]
#[at_cmd("#CGMM", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetModelId;

/// Revision identification #CGMR
#[derive(Clone, AtatCmd)]
#[at_cmd("#CGMR", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetFirmwareVersion;

/// Product serial number identification #CGSN
#[derive(Clone, AtatCmd)]
#[at_cmd("#CGSN", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetImei;

/// International mobile subscriber identity #CIMI
#[derive(Clone, AtatCmd)]
#[at_cmd("#CIMI", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetImsi;

/// Read ICCID #CCID
#[derive(Clone, AtatCmd)]
#[at_cmd("#CCID", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetIccid;

/// Wireless data service +WS46
#[derive(Clone, AtatCmd)]
#[at_cmd("+WS46", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct SetWirelessNetwork {
    #[at_arg(position = 0)]
    pub n: u8,
}

/// Temperature monitor #TEMPMON
///
/// With `mode = 1` the module answers with a single
/// `#TEMPMEAS: <level>,<value>` line.
#[derive(Clone, AtatCmd)]
#[at_cmd("#TEMPMON", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetTemperature {
    #[at_arg(position = 0)]
    pub mode: u8,
}

/// Clock +CCLK
#[derive(Clone, AtatCmd)]
#[at_cmd("+CCLK?", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetClock;
