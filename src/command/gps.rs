//! ### GNSS receiver
use super::NoResponse;
use atat::atat_derive::{AtatCmd, AtatEnum};

/// Restart mode of `$GPSR`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpsReset {
    Factory = 0,
    Cold = 1,
    Warm = 2,
    #[default]
    Hot = 3,
}

/// Reset the GPS receiver $GPSR
#[derive(Clone, AtatCmd)]
#[at_cmd("$GPSR", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct ResetGps {
    #[at_arg(position = 0)]
    pub reset: GpsReset,
}

/// Query the receiver power state $GPSP?, answers `$GPSP: <0|1>`
#[derive(Clone, AtatCmd)]
#[at_cmd("$GPSP?", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetGpsPower;

/// Switch the receiver on or off $GPSP
#[derive(Clone, AtatCmd)]
#[at_cmd("$GPSP", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct SetGpsPower {
    #[at_arg(position = 0)]
    pub on: u8,
}

/// Get the acquired position $GPSACP
///
/// Answers
/// `$GPSACP: <utc>,<lat>,<lon>,<hdop>,<alt>,<fix>,<cog>,<spkm>,<spkn>,<date>,<nsat>`,
/// every field empty while there is no fix.
#[derive(Clone, AtatCmd)]
#[at_cmd("$GPSACP", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct GetAcquiredPosition;

/// Positioning mode of `$GPSSLSR`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpsMode {
    /// Position computed by the SUPL server from the receiver measurements
    MsAssisted = 0,
    /// Position computed by the receiver with SUPL assistance data
    MsBased = 1,
    #[default]
    Standalone = 3,
}

/// GPS quality of service $GPSQOS
#[derive(Clone, AtatCmd)]
#[at_cmd("$GPSQOS", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct SetGpsQualityOfService {
    /// Horizontal accuracy in meters
    #[at_arg(position = 0)]
    pub horizontal_accuracy: u32,
    /// Vertical accuracy in meters
    #[at_arg(position = 1)]
    pub vertical_accuracy: u16,
    /// Response time in seconds
    #[at_arg(position = 2)]
    pub response_time: u16,
    /// Maximum age of the location info in seconds
    #[at_arg(position = 3)]
    pub max_location_age: u32,
    /// `0` current location, `1` last known, `2` initial
    #[at_arg(position = 4)]
    pub location_type: u8,
    /// `0` car navigation
    #[at_arg(position = 5)]
    pub navigation_profile: u8,
    #[at_arg(position = 6)]
    pub velocity_request: u8,
}

/// SUPL location platform address $SLP
#[derive(Clone, AtatCmd)]
#[at_cmd("$SLP", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct SetSuplServer<'a> {
    /// `1`: address given as FQDN
    #[at_arg(position = 0)]
    pub address_type: u8,
    #[at_arg(position = 1, len = 64)]
    pub address: &'a str,
}

/// Supported SUPL version $SUPLV
#[derive(Clone, AtatCmd)]
#[at_cmd("$SUPLV", NoResponse, termination = "\r", timeout_ms = 1000)]
pub struct SetSuplVersion {
    #[at_arg(position = 0)]
    pub version: u8,
}

/// Location services terminal information $LCSTER
#[derive(Clone, AtatCmd)]
#[at_cmd("$LCSTER", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct SetLocationTerminal {
    #[at_arg(position = 0)]
    pub id_type: u8,
    #[at_arg(position = 1)]
    pub id_value: Option<u8>,
    #[at_arg(position = 2)]
    pub pref_pos_mode: Option<u8>,
    #[at_arg(position = 3)]
    pub tls_mode: u8,
}

/// Location services lock $LCSLK
#[derive(Clone, AtatCmd)]
#[at_cmd("$LCSLK", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct SetLocationLock {
    #[at_arg(position = 0)]
    pub lock_type: u8,
    #[at_arg(position = 1)]
    pub lock: u8,
}

/// Location services license $LICLS
#[derive(Clone, AtatCmd)]
#[at_cmd("$LICLS", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct SetLocationLicense {
    #[at_arg(position = 0)]
    pub accepted: u8,
}

/// GLONASS reception $GPSGLO
#[derive(Clone, AtatCmd)]
#[at_cmd("$GPSGLO", NoResponse, termination = "\r", timeout_ms = 2000)]
pub struct SetGlonass {
    #[at_arg(position = 0)]
    pub enabled: u8,
}

/// Start location service request $GPSSLSR
///
/// Answers `OK` at once. The position follows through `$GPSACP`.
#[derive(Clone, AtatCmd)]
#[at_cmd("$GPSSLSR", NoResponse, termination = "\r", timeout_ms = 1000)]
pub struct StartLocationRequest {
    /// `1`: SUPL over the packet data context
    #[at_arg(position = 0)]
    pub transport: u8,
    #[at_arg(position = 1)]
    pub mode: GpsMode,
    #[at_arg(position = 2)]
    pub client_id: Option<u8>,
    #[at_arg(position = 3)]
    pub client_type: Option<u8>,
    #[at_arg(position = 4)]
    pub mlc_number: Option<u8>,
    #[at_arg(position = 5)]
    pub mlc_number_type: Option<u8>,
    /// `1`: return the first position only
    #[at_arg(position = 6)]
    pub interval: u8,
}

/// Unsolicited NMEA data $GPSNMUN
///
/// With `enable = 3` the module answers `CONNECT` and streams the selected
/// sentences in online mode until `+++`.
#[derive(Clone, AtatCmd)]
#[at_cmd("$GPSNMUN", NoResponse, termination = "\r", timeout_ms = 5000)]
pub struct SetNmeaStream {
    #[at_arg(position = 0)]
    pub enable: u8,
    #[at_arg(position = 1)]
    pub gga: u8,
    #[at_arg(position = 2)]
    pub gll: u8,
    #[at_arg(position = 3)]
    pub gsa: u8,
    #[at_arg(position = 4)]
    pub gsv: u8,
    #[at_arg(position = 5)]
    pub rmc: u8,
    #[at_arg(position = 6)]
    pub vtg: u8,
}
