//! GNSS receiver, standalone or SUPL assisted.

use embassy_time::{Duration, Instant, Timer};
use embedded_io_async::{Read, ReadReady, Write};
use heapless::String;

use crate::buffer::{line_after, truncated};
use crate::command::general::SetWirelessNetwork;
use crate::command::gps::{
    GetAcquiredPosition, GetGpsPower, GpsMode, GpsReset, ResetGps, SetGlonass, SetGpsPower,
    SetGpsQualityOfService, SetLocationLicense, SetLocationLock, SetLocationTerminal,
    SetNmeaStream, SetSuplServer, SetSuplVersion, StartLocationRequest,
};
use crate::command::network::{SetPassword, SetPdpContextDefinition, SetUserId};
use crate::command::socket::SetSocketConfig;
use crate::config::Config;
use crate::connection::{Connection, ConnectionError, NetworkState};
use crate::dispatcher::{Dispatcher, CRLF, ERROR, ERROR_CODE, OK};
use crate::error::Error;

const SUPL_SERVER: &str = "supl.nokia.com:7275";
/// `+WS46` selection for UTRAN only, which SUPL needs
const UTRAN: u8 = 22;
const NMEA_TIMEOUT: Duration = Duration::from_secs(5);
const ESCAPE_TIMEOUT: Duration = Duration::from_secs(2);

/// Fields of `$GPSACP`, in the order the module reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpsField {
    Time,
    Latitude,
    Longitude,
    Hdop,
    Altitude,
    FixMode,
    Course,
    SpeedKmh,
    SpeedKnots,
    Date,
    Satellites,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GpsFix {
    /// UTC `hhmmss`
    pub time: String<6>,
    /// `ddmm.mmmm`
    pub latitude: String<12>,
    pub latitude_indicator: char,
    /// `dddmm.mmmm`
    pub longitude: String<12>,
    pub longitude_indicator: char,
    pub hdop: f32,
    pub altitude: f32,
    /// `0`/`1` no fix, `2` 2D, `3` 3D
    pub fix_mode: u8,
    /// `ddd.mm`
    pub course: String<8>,
    pub speed_kmh: f32,
    /// `ddmmyy`
    pub date: String<6>,
    pub satellites: u8,
}

impl GpsFix {
    pub fn is_fixed(&self) -> bool {
        matches!(self.fix_mode, 2 | 3)
    }

    /// Latitude in decimal degrees, negative south of the equator.
    pub fn latitude_degrees(&self) -> Option<f32> {
        convert_to_degrees(&self.latitude, self.latitude_indicator)
    }

    /// Longitude in decimal degrees, negative west of Greenwich.
    pub fn longitude_degrees(&self) -> Option<f32> {
        convert_to_degrees(&self.longitude, self.longitude_indicator)
    }

    /// Parse the fields following `$GPSACP: `.
    fn parse(fields: &str) -> Result<Self, GpsField> {
        let mut t = fields.split(',').map(str::trim);
        let mut next = |field| t.next().filter(|v| !v.is_empty()).ok_or(field);
        let mut fix = Self::default();

        fix.time = truncated(next(GpsField::Time)?);

        let (latitude, indicator) = split_indicator(next(GpsField::Latitude)?)
            .ok_or(GpsField::Latitude)?;
        fix.latitude = truncated(latitude);
        fix.latitude_indicator = indicator;

        let (longitude, indicator) = split_indicator(next(GpsField::Longitude)?)
            .ok_or(GpsField::Longitude)?;
        fix.longitude = truncated(longitude);
        fix.longitude_indicator = indicator;

        fix.hdop = number(next(GpsField::Hdop)?);
        fix.altitude = number(next(GpsField::Altitude)?);
        fix.fix_mode = next(GpsField::FixMode)?.parse().unwrap_or(0);
        fix.course = truncated(next(GpsField::Course)?);
        fix.speed_kmh = number(next(GpsField::SpeedKmh)?);
        next(GpsField::SpeedKnots)?;
        fix.date = truncated(next(GpsField::Date)?);
        fix.satellites = next(GpsField::Satellites)?.parse().unwrap_or(0);
        Ok(fix)
    }
}

/// Accuracy requested from the receiver with `$GPSQOS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QualityOfService {
    /// Meters
    pub horizontal_accuracy: u32,
    /// Meters
    pub vertical_accuracy: u16,
    /// Seconds
    pub response_time: u16,
    /// Seconds
    pub max_location_age: u32,
    /// `0` current location, `1` last known, `2` initial
    pub location_type: u8,
    /// `0` car navigation
    pub navigation_profile: u8,
    pub velocity_request: bool,
}

/// Values applied on an assisted start.
impl Default for QualityOfService {
    fn default() -> Self {
        Self {
            horizontal_accuracy: 5,
            vertical_accuracy: 5,
            response_time: 100,
            max_location_age: 0,
            location_type: 0,
            navigation_profile: 0,
            velocity_request: true,
        }
    }
}

/// NMEA sentences available through `$GPSNMUN`, in command order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NmeaSentence {
    Gga,
    Gll,
    Gsa,
    Gsv,
    Rmc,
    Vtg,
}

impl NmeaSentence {
    fn stream(self) -> SetNmeaStream {
        let on = |s: Self| u8::from(s == self);
        SetNmeaStream {
            enable: 3,
            gga: on(Self::Gga),
            gll: on(Self::Gll),
            gsa: on(Self::Gsa),
            gsv: on(Self::Gsv),
            rmc: on(Self::Rmc),
            vtg: on(Self::Vtg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpsError {
    Reset(Error),
    /// Querying the receiver power state failed
    Power(Error),
    Start(Error),
    Stop(Error),
    Position(Error),
    /// The receiver has no position yet
    NotFixed,
    MissingField(GpsField),
    /// No 2D or 3D fix before the timeout
    NoSignal,
    /// The fix never reached the requested HDOP
    Hdop,
    /// `+WS46` refused on an assisted start
    Network(Error),
    Apn(Error),
    Login(Error),
    Password(Error),
    SocketConfig(Error),
    QualityOfService(Error),
    SuplServer(Error),
    SuplVersion(Error),
    LocationTerminal(Error),
    LocationLicense(Error),
    LocationLock(Error),
    Glonass(Error),
    LocationRequest(Error),
    /// The context SUPL runs over could not be activated
    DataConnection(ConnectionError),
    /// No NMEA sentence could be read
    Nmea(Error),
}

impl GpsError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Reset(_)
            | Self::Stop(_)
            | Self::Position(_)
            | Self::NoSignal
            | Self::Nmea(_) => 1,
            Self::Power(_) | Self::NotFixed | Self::Hdop => 2,
            Self::Start(_) => 3,
            Self::MissingField(field) => *field as u8 + 3,
            Self::Network(_) => 5,
            Self::Apn(_) => 6,
            Self::Login(_) => 7,
            Self::Password(_) => 8,
            Self::SocketConfig(_) => 9,
            Self::QualityOfService(_) => 10,
            Self::SuplServer(_) => 11,
            Self::SuplVersion(_) => 12,
            Self::LocationTerminal(_) => 13,
            Self::LocationLicense(_) => 14,
            Self::LocationLock(_) => 15,
            Self::Glonass(_) => 16,
            Self::LocationRequest(_) => 17,
            Self::DataConnection(_) => 18,
        }
    }
}

pub struct Gps<'a, T, const N: usize> {
    dispatcher: &'a mut Dispatcher<T, N>,
    config: &'a Config,
    network: &'a mut NetworkState,
    fix: &'a mut GpsFix,
}

impl<'a, T, const N: usize> Gps<'a, T, N>
where
    T: Read + Write + ReadReady,
{
    pub(crate) fn new(
        dispatcher: &'a mut Dispatcher<T, N>,
        config: &'a Config,
        network: &'a mut NetworkState,
        fix: &'a mut GpsFix,
    ) -> Self {
        Self {
            dispatcher,
            config,
            network,
            fix,
        }
    }

    /// Last fix read by [`Self::check`].
    pub fn fix(&self) -> &GpsFix {
        &*self.fix
    }

    /// Reset the receiver and start it in `mode`. A receiver that already
    /// runs is left as is.
    ///
    /// The assisted modes set up SUPL over the configured APN and end with
    /// the packet data context active.
    pub async fn start(&mut self, mode: GpsMode, reset: GpsReset) -> Result<(), GpsError> {
        self.dispatcher
            .expect_ok(&ResetGps { reset })
            .await
            .map_err(GpsError::Reset)?;

        let patterns = ["GPSP: 1", OK, ERROR_CODE, ERROR];
        match self
            .dispatcher
            .send_command(&GetGpsPower, &patterns)
            .await
            .map_err(GpsError::Power)?
        {
            0 => {
                debug!("[GPS] receiver already on");
                return Ok(());
            }
            1 => {}
            index => {
                return Err(GpsError::Power(
                    self.dispatcher.failure(patterns[index]).await,
                ))
            }
        }

        if mode != GpsMode::Standalone {
            return self.start_assisted(mode).await;
        }

        self.dispatcher
            .expect_ok(&SetGpsPower { on: 1 })
            .await
            .map_err(GpsError::Start)?;
        info!("[GPS] receiver on");
        Ok(())
    }

    async fn start_assisted(&mut self, mode: GpsMode) -> Result<(), GpsError> {
        self.dispatcher
            .expect_ok(&SetWirelessNetwork { n: UTRAN })
            .await
            .map_err(GpsError::Network)?;

        let apn = &self.config.apn;
        self.dispatcher
            .expect_ok(&SetPdpContextDefinition {
                cid: 1,
                pdp_type: "IP",
                apn: &apn.name,
            })
            .await
            .map_err(GpsError::Apn)?;
        self.dispatcher
            .expect_ok(&SetUserId { user: &apn.login })
            .await
            .map_err(GpsError::Login)?;
        self.dispatcher
            .expect_ok(&SetPassword {
                password: &apn.password,
            })
            .await
            .map_err(GpsError::Password)?;
        self.dispatcher
            .expect_ok(&SetSocketConfig {
                conn_id: 1,
                cid: 1,
                packet_size: 300,
                max_timeout: 90,
                conn_timeout: 600,
                tx_timeout: 50,
            })
            .await
            .map_err(GpsError::SocketConfig)?;

        self.set_quality_of_service(&QualityOfService::default())
            .await?;

        self.dispatcher
            .expect_ok(&SetSuplServer {
                address_type: 1,
                address: SUPL_SERVER,
            })
            .await
            .map_err(GpsError::SuplServer)?;
        self.dispatcher
            .expect_ok(&SetSuplVersion { version: 1 })
            .await
            .map_err(GpsError::SuplVersion)?;
        self.dispatcher
            .expect_ok(&SetLocationTerminal {
                id_type: 1,
                id_value: None,
                pref_pos_mode: None,
                tls_mode: 1,
            })
            .await
            .map_err(GpsError::LocationTerminal)?;
        self.dispatcher
            .expect_ok(&SetLocationLicense { accepted: 1 })
            .await
            .map_err(GpsError::LocationLicense)?;
        self.dispatcher
            .expect_ok(&SetLocationLock {
                lock_type: 1,
                lock: 1,
            })
            .await
            .map_err(GpsError::LocationLock)?;
        self.dispatcher
            .expect_ok(&SetGlonass { enabled: 1 })
            .await
            .map_err(GpsError::Glonass)?;

        self.dispatcher
            .expect_ok(&StartLocationRequest {
                transport: 1,
                mode,
                client_id: None,
                client_type: None,
                mlc_number: None,
                mlc_number_type: None,
                interval: 1,
            })
            .await
            .map_err(GpsError::LocationRequest)?;

        let budget = self.config.timing.data_connection_budget;
        Connection::new(self.dispatcher, self.config, self.network)
            .check_data_connection(budget)
            .await
            .map_err(GpsError::DataConnection)?;
        info!("[GPS] assisted start {:?}", mode);
        Ok(())
    }

    pub async fn set_quality_of_service(&mut self, qos: &QualityOfService) -> Result<(), GpsError> {
        self.dispatcher
            .expect_ok(&SetGpsQualityOfService {
                horizontal_accuracy: qos.horizontal_accuracy,
                vertical_accuracy: qos.vertical_accuracy,
                response_time: qos.response_time,
                max_location_age: qos.max_location_age,
                location_type: qos.location_type,
                navigation_profile: qos.navigation_profile,
                velocity_request: u8::from(qos.velocity_request),
            })
            .await
            .map_err(GpsError::QualityOfService)
    }

    /// Read one `sentence` from the NMEA stream, without its checksum.
    pub async fn nmea_string(&mut self, sentence: NmeaSentence) -> Result<String<100>, GpsError> {
        let patterns = ["CONNECT\r\n", ERROR_CODE, ERROR];
        let index = self
            .dispatcher
            .send_command(&sentence.stream(), &patterns)
            .await
            .map_err(GpsError::Nmea)?;
        if index != 0 {
            return Err(GpsError::Nmea(
                self.dispatcher.failure(patterns[index]).await,
            ));
        }

        let line: Result<String<100>, Error> = match self.dispatcher.wait_for(&[CRLF], NMEA_TIMEOUT).await {
            Ok(_) => {
                let response = self.dispatcher.response();
                response
                    .find('*')
                    .map(|end| truncated(response[..end].trim_start()))
                    .ok_or(Error::Parse)
            }
            Err(e) => Err(e),
        };

        // the stream keeps running until online mode is left
        if self
            .dispatcher
            .send_raw(b"+++", &[OK], ESCAPE_TIMEOUT)
            .await
            .is_err()
        {
            warn!("[GPS] NMEA stream still in online mode");
        }
        line.map_err(GpsError::Nmea)
    }

    pub async fn stop(&mut self) -> Result<(), GpsError> {
        self.dispatcher
            .expect_ok(&SetGpsPower { on: 0 })
            .await
            .map_err(GpsError::Stop)
    }

    /// Read the current position into the cached fix.
    pub async fn check(&mut self) -> Result<&GpsFix, GpsError> {
        *self.fix = GpsFix::default();
        self.dispatcher
            .expect_ok(&GetAcquiredPosition)
            .await
            .map_err(GpsError::Position)?;

        let response = self.dispatcher.response();
        if response.contains("$GPSACP: ,") {
            return Err(GpsError::NotFixed);
        }
        let fields = line_after(response, "$GPSACP: ")
            .ok_or(GpsError::MissingField(GpsField::Time))?;
        *self.fix = GpsFix::parse(fields).map_err(GpsError::MissingField)?;
        Ok(&*self.fix)
    }

    /// Poll until the receiver reports a 2D or 3D fix. With `desired_hdop`,
    /// keep polling while the HDOP is above it.
    pub async fn wait_for_signal(
        &mut self,
        timeout: Duration,
        desired_hdop: Option<f32>,
    ) -> Result<(), GpsError> {
        let start = Instant::now();
        loop {
            if let Ok(fix) = self.check().await {
                if fix.is_fixed() {
                    break;
                }
            }
            if start.elapsed() >= timeout {
                warn!("[GPS] no fix");
                return Err(GpsError::NoSignal);
            }
            Timer::after(self.config.timing.gps_poll).await;
        }

        let Some(target) = desired_hdop else {
            return Ok(());
        };
        while !(self.fix.is_fixed() && self.fix.hdop <= target) {
            if start.elapsed() >= timeout {
                warn!("[GPS] HDOP {} above {}", self.fix.hdop, target);
                return Err(GpsError::Hdop);
            }
            Timer::after(self.config.timing.gps_hdop_poll).await;
            // a failed read leaves a cleared fix, which is not fixed
            self.check().await.ok();
        }
        Ok(())
    }
}

/// Convert `ddmm.mmmm` (latitude, `N`/`S`) or `dddmm.mmmm` (longitude,
/// `E`/`W`) to decimal degrees.
pub fn convert_to_degrees(raw: &str, indicator: char) -> Option<f32> {
    let digits = match indicator {
        'N' | 'S' => 2,
        'E' | 'W' => 3,
        _ => return None,
    };
    let degrees: f32 = raw.get(..digits)?.parse().ok()?;
    let minutes: f32 = raw.get(digits..)?.parse().ok()?;
    let value = degrees + minutes / 60.0;
    Some(if matches!(indicator, 'S' | 'W') {
        -value
    } else {
        value
    })
}

fn split_indicator(value: &str) -> Option<(&str, char)> {
    let indicator = value.chars().last()?;
    Some((&value[..value.len() - indicator.len_utf8()], indicator))
}

fn number(value: &str) -> f32 {
    value.parse().unwrap_or(0.0)
}
