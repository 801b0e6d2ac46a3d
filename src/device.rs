//! Module level housekeeping: start up handshake, SIM, radio and
//! identification queries, and unsolicited event handling.

use core::str::FromStr;

use embassy_time::Duration;
use embedded_io_async::{Read, ReadReady, Write};
use heapless::String;

use crate::buffer::{first_number, line_after, tokens, truncated};
use crate::command::general::{
    DisableEcho, GetClock, GetFirmwareVersion, GetHardwareRevision, GetIccid, GetImei, GetImsi,
    GetManufacturerId, GetModelId, GetNetworkType, GetOperatorSelection, GetPinStatus,
    GetSignalQuality, GetTemperature, SetPin, SetReportMobileTerminationError,
    SetWirelessNetwork, Shutdown,
};
use crate::command::AT;
use crate::config::Config;
use crate::connection::NetworkState;
use crate::dispatcher::{Dispatcher, ERROR, ERROR_CODE, OK};
use crate::error::Error;
use crate::module_timing::prompt_timeout;
use crate::socket::{AcceptError, SocketId, SocketTable, Sockets};

const ALIVE_ATTEMPTS: usize = 7;
const OFF_ALIVE_ATTEMPTS: usize = 17;
const SETUP_ATTEMPTS: usize = 3;
const SHUTDOWN_ATTEMPTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceError {
    /// The module does not answer `AT`
    NoAnswer,
    /// Numeric error reporting could not be enabled
    ErrorReporting(Error),
    Echo(Error),
    Command(Error),
    /// The answer did not have the expected shape
    Parse,
    /// Nothing arrived before the timeout
    NoEvent,
    Accept(AcceptError),
}

impl DeviceError {
    pub fn code(&self) -> u8 {
        match self {
            Self::NoAnswer | Self::Command(_) | Self::Accept(_) => 1,
            Self::ErrorReporting(_) | Self::Parse => 2,
            Self::Echo(_) | Self::NoEvent => 3,
        }
    }
}

/// Answer of `+CPIN?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinStatus {
    Ready,
    SimPin,
    SimPuk,
    PhoneSimPin,
    PhoneFirstSimPin,
    PhoneFirstSimPuk,
    SimPin2,
    SimPuk2,
    NetworkPin,
    NetworkPuk,
    NetworkSubsetPin,
    NetworkSubsetPuk,
    ServiceProviderPin,
    ServiceProviderPuk,
    CorporatePin,
    CorporatePuk,
}

impl FromStr for PinStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "READY" => Self::Ready,
            "SIM PIN" => Self::SimPin,
            "SIM PUK" => Self::SimPuk,
            "PH-SIM PIN" => Self::PhoneSimPin,
            "PH-FSIM PIN" => Self::PhoneFirstSimPin,
            "PH-FSIM PUK" => Self::PhoneFirstSimPuk,
            "SIM PIN2" => Self::SimPin2,
            "SIM PUK2" => Self::SimPuk2,
            "PH-NET PIN" => Self::NetworkPin,
            "PH-NET PUK" => Self::NetworkPuk,
            "PH-NETSUB PIN" => Self::NetworkSubsetPin,
            "PH-NETSUB PUK" => Self::NetworkSubsetPuk,
            "PH-SP PIN" => Self::ServiceProviderPin,
            "PH-SP PUK" => Self::ServiceProviderPuk,
            "PH-CORP PIN" => Self::CorporatePin,
            "PH-CORP PUK" => Self::CorporatePuk,
            _ => return Err(()),
        })
    }
}

/// `<nt>` of `#PSNT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkType {
    Gprs,
    Egprs,
    Wcdma,
    Hsdpa,
    Lte,
    /// Unknown or not registered
    Unknown,
}

impl From<u8> for NetworkType {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::Gprs,
            1 => Self::Egprs,
            2 => Self::Wcdma,
            3 => Self::Hsdpa,
            4 => Self::Lte,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InfoKind {
    HardwareRevision,
    Manufacturer,
    Model,
    FirmwareRevision,
    Imei,
    Imsi,
    Iccid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Temperature {
    /// Range the reading falls in, `0` is the normal operating range
    pub interval: i8,
    pub celsius: i16,
}

/// Network time of `+CCLK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NetworkTime {
    /// Years since 2000
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Offset from UTC in quarters of an hour
    pub timezone: i8,
}

impl NetworkTime {
    /// Parse `yy/MM/dd,hh:mm:ss±zz`.
    fn parse(s: &str) -> Option<Self> {
        let (date, time) = s.trim().trim_matches('"').split_once(',')?;
        let mut d = date.split('/').map(|v| v.parse::<u8>().ok());
        let (clock, zone) = time.split_at(time.find(['+', '-'])?);
        let mut t = clock.split(':').map(|v| v.parse::<u8>().ok());
        Some(Self {
            year: d.next()??,
            month: d.next()??,
            day: d.next()??,
            hour: t.next()??,
            minute: t.next()??,
            second: t.next()??,
            timezone: zone.parse().ok()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IncomingEvent {
    /// A message was stored at this index
    Sms(u16),
    /// A peer connected to a listening socket and was accepted
    Connection(SocketId),
    /// Data is pending on an open socket
    Data(SocketId),
}

/// Convert the `<rssi>` of `+CSQ` to dBm.
pub fn rssi_to_dbm(rssi: u8) -> i16 {
    match rssi {
        0 | 99 => -113,
        1 => -111,
        33 => 0,
        n => 2 * n as i16 - 113,
    }
}

pub struct Device<'a, T, const N: usize> {
    dispatcher: &'a mut Dispatcher<T, N>,
    config: &'a Config,
    network: &'a mut NetworkState,
    table: &'a mut SocketTable,
}

impl<'a, T, const N: usize> Device<'a, T, N>
where
    T: Read + Write + ReadReady,
{
    pub(crate) fn new(
        dispatcher: &'a mut Dispatcher<T, N>,
        config: &'a Config,
        network: &'a mut NetworkState,
        table: &'a mut SocketTable,
    ) -> Self {
        Self {
            dispatcher,
            config,
            network,
            table,
        }
    }

    /// Start up handshake, to run once the module is powered: wait for it to
    /// answer, then enable numeric errors and disable echo.
    pub async fn on(&mut self) -> Result<(), DeviceError> {
        if !self.is_alive(ALIVE_ATTEMPTS, None).await {
            error!("[Device] module does not answer");
            return Err(DeviceError::NoAnswer);
        }

        let mut res = Err(Error::Timeout);
        for _ in 0..SETUP_ATTEMPTS {
            res = self
                .dispatcher
                .expect_ok(&SetReportMobileTerminationError { n: 1 })
                .await;
            if res.is_ok() {
                break;
            }
        }
        res.map_err(DeviceError::ErrorReporting)?;

        let mut res = Err(Error::Timeout);
        for _ in 0..SETUP_ATTEMPTS {
            res = self.dispatcher.expect_ok(&DisableEcho).await;
            if res.is_ok() {
                break;
            }
        }
        res.map_err(DeviceError::Echo)?;

        info!("[Device] module ready");
        Ok(())
    }

    /// Software shutdown. A module that does not answer has to be switched
    /// off with [`crate::pwr::power_off`].
    pub async fn off(&mut self) -> Result<(), DeviceError> {
        if !self
            .is_alive(OFF_ALIVE_ATTEMPTS, Some(Duration::from_secs(1)))
            .await
        {
            return Err(DeviceError::NoAnswer);
        }

        let mut res = Err(Error::Timeout);
        for _ in 0..SHUTDOWN_ATTEMPTS {
            res = self.dispatcher.expect_ok(&Shutdown).await;
            if res.is_ok() {
                break;
            }
        }
        *self.network = NetworkState::default();
        *self.table = SocketTable::default();
        res.map_err(DeviceError::Command)
    }

    async fn is_alive(&mut self, attempts: usize, timeout: Option<Duration>) -> bool {
        for _ in 0..attempts {
            let res = match timeout {
                Some(timeout) => self.dispatcher.expect_ok_with_timeout(&AT, timeout).await,
                None => self.dispatcher.expect_ok(&AT).await,
            };
            if res.is_ok() {
                return true;
            }
        }
        false
    }

    pub async fn pin_status(&mut self) -> Result<PinStatus, DeviceError> {
        self.dispatcher
            .expect_ok(&GetPinStatus)
            .await
            .map_err(DeviceError::Command)?;
        line_after(self.dispatcher.response(), "+CPIN: ")
            .and_then(|s| s.parse().ok())
            .ok_or(DeviceError::Parse)
    }

    pub async fn enter_pin(&mut self, code: &str) -> Result<(), DeviceError> {
        self.dispatcher
            .expect_ok(&SetPin {
                pin: code,
                new_pin: None,
            })
            .await
            .map_err(DeviceError::Command)
    }

    /// Unblock the SIM with `puk` and set `new_pin`.
    pub async fn change_pin(&mut self, puk: &str, new_pin: &str) -> Result<(), DeviceError> {
        self.dispatcher
            .expect_ok(&SetPin {
                pin: puk,
                new_pin: Some(new_pin),
            })
            .await
            .map_err(DeviceError::Command)
    }

    /// Received signal strength in dBm.
    pub async fn rssi(&mut self) -> Result<i16, DeviceError> {
        self.dispatcher
            .expect_ok(&GetSignalQuality)
            .await
            .map_err(DeviceError::Command)?;
        line_after(self.dispatcher.response(), "+CSQ: ")
            .and_then(|s| first_number(s, ", "))
            .map(rssi_to_dbm)
            .ok_or(DeviceError::Parse)
    }

    pub async fn network_type(&mut self) -> Result<NetworkType, DeviceError> {
        self.dispatcher
            .expect_ok(&GetNetworkType)
            .await
            .map_err(DeviceError::Command)?;
        line_after(self.dispatcher.response(), "#PSNT: ")
            .and_then(|s| tokens(s, ", ").nth(1))
            .and_then(|s| s.parse::<u8>().ok())
            .map(NetworkType::from)
            .ok_or(DeviceError::Parse)
    }

    /// Name of the selected operator.
    pub async fn operator(&mut self) -> Result<String<32>, DeviceError> {
        self.dispatcher
            .expect_ok(&GetOperatorSelection)
            .await
            .map_err(DeviceError::Command)?;
        self.dispatcher
            .response()
            .split('"')
            .nth(1)
            .map(truncated)
            .ok_or(DeviceError::Parse)
    }

    pub async fn info(&mut self, kind: InfoKind) -> Result<String<32>, DeviceError> {
        let res = match kind {
            InfoKind::HardwareRevision => self.dispatcher.expect_ok(&GetHardwareRevision).await,
            InfoKind::Manufacturer => self.dispatcher.expect_ok(&GetManufacturerId).await,
            InfoKind::Model => self.dispatcher.expect_ok(&GetModelId).await,
            InfoKind::FirmwareRevision => self.dispatcher.expect_ok(&GetFirmwareVersion).await,
            InfoKind::Imei => self.dispatcher.expect_ok(&GetImei).await,
            InfoKind::Imsi => self.dispatcher.expect_ok(&GetImsi).await,
            InfoKind::Iccid => self.dispatcher.expect_ok(&GetIccid).await,
        };
        res.map_err(DeviceError::Command)?;

        let response = self.dispatcher.response();
        let value = response
            .split_once(':')
            .map(|(_, rest)| rest)
            .unwrap_or(response);
        tokens(value, " \r\n")
            .next()
            .filter(|v| *v != OK)
            .map(truncated)
            .ok_or(DeviceError::Parse)
    }

    /// Select the radio access technologies, `n` as in `+WS46`.
    pub async fn set_wireless_network(&mut self, n: u8) -> Result<(), DeviceError> {
        self.dispatcher
            .expect_ok(&SetWirelessNetwork { n })
            .await
            .map_err(DeviceError::Command)
    }

    pub async fn temperature(&mut self) -> Result<Temperature, DeviceError> {
        let patterns = ["#TEMPMEAS:", ERROR_CODE, ERROR];
        let index = self
            .dispatcher
            .send_command(&GetTemperature { mode: 1 }, &patterns)
            .await
            .map_err(DeviceError::Command)?;
        if index != 0 {
            return Err(DeviceError::Command(
                self.dispatcher.failure(patterns[index]).await,
            ));
        }
        self.dispatcher
            .wait_for(&[OK], prompt_timeout())
            .await
            .map_err(DeviceError::Command)?;

        let mut t = tokens(self.dispatcher.response(), ", \r\n");
        let interval = t.next().and_then(|v| v.parse().ok());
        let celsius = t.next().and_then(|v| v.parse().ok());
        match (interval, celsius) {
            (Some(interval), Some(celsius)) => Ok(Temperature { interval, celsius }),
            _ => Err(DeviceError::Parse),
        }
    }

    pub async fn network_time(&mut self) -> Result<NetworkTime, DeviceError> {
        self.dispatcher
            .expect_ok(&GetClock)
            .await
            .map_err(DeviceError::Command)?;
        line_after(self.dispatcher.response(), "+CCLK: ")
            .and_then(NetworkTime::parse)
            .ok_or(DeviceError::Parse)
    }

    /// Wait up to `wait` for a new message or socket activity. A peer
    /// connecting to a listening socket is accepted.
    pub async fn manage_incoming(&mut self, wait: Duration) -> Result<IncomingEvent, DeviceError> {
        let index = self
            .dispatcher
            .wait_for(&["+CMTI", "SRING: "], wait)
            .await
            .map_err(|_| DeviceError::NoEvent)?;

        if index == 0 {
            self.dispatcher
                .wait_for(&[","], prompt_timeout())
                .await
                .map_err(DeviceError::Command)?;
            self.dispatcher
                .wait_for(&["\r"], prompt_timeout())
                .await
                .map_err(DeviceError::Command)?;
            let index = first_number(self.dispatcher.response(), "\r\n ")
                .ok_or(DeviceError::Parse)?;
            info!("[Device] new message at {}", index);
            return Ok(IncomingEvent::Sms(index));
        }

        self.dispatcher
            .wait_for(&["\r"], prompt_timeout())
            .await
            .map_err(DeviceError::Command)?;
        let id = first_number(self.dispatcher.response(), "\r\n ")
            .and_then(SocketId::new)
            .ok_or(DeviceError::Parse)?;

        let mut sockets = Sockets::new(self.dispatcher, self.config, self.network, self.table);
        match sockets.accept(id).await {
            Ok(()) => {
                info!("[Device] accepted connection on socket {}", id.get());
                Ok(IncomingEvent::Connection(id))
            }
            Err(AcceptError::NothingPending) => Ok(IncomingEvent::Data(id)),
            Err(e) => Err(DeviceError::Accept(e)),
        }
    }
}
