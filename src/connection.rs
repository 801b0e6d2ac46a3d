//! Network registration and packet data context activation.

use embassy_time::{Duration, Instant, Timer};
use embedded_io_async::{Read, ReadReady, Write};
use no_std_net::IpAddr;

use crate::buffer::{first_number, line_after};
use crate::command::network::{
    GetEpsNetworkRegistrationStatus, GetGprsContextState, GetGprsNetworkRegistrationStatus,
    GetNetworkRegistrationStatus, SetGprsContextState, SetPassword, SetPdpContextDefinition,
    SetUserId,
};
use crate::config::Config;
use crate::dispatcher::{Dispatcher, CRLF};
use crate::error::Error;
use crate::module_timing::prompt_timeout;

/// `<stat>` of `+CREG`, `+CGREG` and `+CEREG`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationStatus {
    NotRegistering = 0,
    Home = 1,
    Searching = 2,
    Denied = 3,
    Unknown = 4,
    Roaming = 5,
    SmsOnlyHome = 6,
    SmsOnlyRoaming = 7,
    EmergencyOnly = 8,
    CsfbNotPreferredHome = 9,
    CsfbNotPreferredRoaming = 10,
}

impl From<u8> for RegistrationStatus {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::NotRegistering,
            1 => Self::Home,
            2 => Self::Searching,
            3 => Self::Denied,
            5 => Self::Roaming,
            6 => Self::SmsOnlyHome,
            7 => Self::SmsOnlyRoaming,
            8 => Self::EmergencyOnly,
            9 => Self::CsfbNotPreferredHome,
            10 => Self::CsfbNotPreferredRoaming,
            _ => Self::Unknown,
        }
    }
}

impl RegistrationStatus {
    pub fn registered(&self) -> bool {
        matches!(self, Self::Home | Self::Roaming)
    }

    /// Registered in the EPS sense, where the restricted services count too.
    pub fn eps_registered(&self) -> bool {
        (*self as u8) == 1 || (*self as u8) >= 5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionError {
    /// Circuit switched registration did not complete
    NotRegistered(RegistrationStatus),
    /// Packet switched registration did not complete
    NotAttached(RegistrationStatus),
    Apn(Error),
    Login(Error),
    Password(Error),
    Activation(Error),
    /// The activation answer did not carry a valid address
    IpAddress,
}

impl ConnectionError {
    pub fn code(&self) -> u8 {
        match self {
            Self::NotRegistered(status) => (*status as u8).max(1),
            Self::NotAttached(status) => *status as u8 + 6,
            Self::Apn(_) => 12,
            Self::Login(_) => 13,
            Self::Password(_) => 14,
            Self::Activation(_) => 15,
            Self::IpAddress => 16,
        }
    }
}

/// Address assigned by the last context activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkState {
    ip: Option<IpAddr>,
}

impl NetworkState {
    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }
}

pub struct Connection<'a, T, const N: usize> {
    dispatcher: &'a mut Dispatcher<T, N>,
    config: &'a Config,
    network: &'a mut NetworkState,
}

impl<'a, T, const N: usize> Connection<'a, T, N>
where
    T: Read + Write + ReadReady,
{
    pub(crate) fn new(
        dispatcher: &'a mut Dispatcher<T, N>,
        config: &'a Config,
        network: &'a mut NetworkState,
    ) -> Self {
        Self {
            dispatcher,
            config,
            network,
        }
    }

    pub fn ip_address(&self) -> Option<IpAddr> {
        self.network.ip
    }

    /// Make sure a packet data context is active, registering and
    /// activating it if needed within `budget`.
    ///
    /// An already active context returns at once, keeping the address
    /// learned at activation.
    pub async fn check_data_connection(&mut self, budget: Duration) -> Result<(), ConnectionError> {
        if let Ok(0) = self
            .dispatcher
            .send_command(&GetGprsContextState, &["GPRS: 1", "GPRS: 0"])
            .await
        {
            debug!("[Connection] context already active");
            return Ok(());
        }

        let mut start = Instant::now();
        let status = self
            .poll_registration(
                &GetNetworkRegistrationStatus,
                "+CREG: 0,",
                &[0, 2, 3, 4],
                budget,
                self.config.timing.registration_poll,
                &mut start,
            )
            .await;
        if !status.registered() {
            warn!("[Connection] not registered: {:?}", status);
            return Err(ConnectionError::NotRegistered(status));
        }

        let status = self
            .poll_registration(
                &GetGprsNetworkRegistrationStatus,
                "+CGREG: 0,",
                &[0, 2, 4],
                budget,
                self.config.timing.registration_poll,
                &mut start,
            )
            .await;
        if !status.registered() {
            warn!("[Connection] not attached: {:?}", status);
            return Err(ConnectionError::NotAttached(status));
        }

        let apn = &self.config.apn;
        self.dispatcher
            .expect_ok(&SetPdpContextDefinition {
                cid: 1,
                pdp_type: "IP",
                apn: &apn.name,
            })
            .await
            .map_err(ConnectionError::Apn)?;
        self.dispatcher
            .expect_ok(&SetUserId { user: &apn.login })
            .await
            .map_err(ConnectionError::Login)?;
        self.dispatcher
            .expect_ok(&SetPassword {
                password: &apn.password,
            })
            .await
            .map_err(ConnectionError::Password)?;

        self.dispatcher
            .expect_ok(&SetGprsContextState { mode: 1 })
            .await
            .map_err(ConnectionError::Activation)?;

        let ip = parse_ip(self.dispatcher.response()).ok_or(ConnectionError::IpAddress)?;
        info!("[Connection] context active");
        self.network.ip = Some(ip);
        Ok(())
    }

    /// Wait for circuit switched registration only.
    pub async fn check_connection(&mut self, budget: Duration) -> Result<(), ConnectionError> {
        let mut start = Instant::now();
        let status = self
            .poll_registration(
                &GetNetworkRegistrationStatus,
                "+CREG: 0,",
                &[0, 2, 3, 4],
                budget,
                self.config.timing.registration_poll,
                &mut start,
            )
            .await;
        if status.registered() {
            Ok(())
        } else {
            Err(ConnectionError::NotRegistered(status))
        }
    }

    /// Wait for EPS registration.
    pub async fn check_connection_eps(&mut self, budget: Duration) -> Result<(), ConnectionError> {
        let mut start = Instant::now();
        loop {
            let status = self
                .query_status(&GetEpsNetworkRegistrationStatus, "+CEREG: 0,")
                .await;
            if status.eps_registered() {
                return Ok(());
            }
            debug!("[Connection] EPS status {:?}", status);

            if elapsed(&mut start) >= budget {
                return Err(ConnectionError::NotRegistered(status));
            }
            Timer::after(self.config.timing.eps_poll).await;
        }
    }

    /// Poll a registration status while it is one of `retry_on`.
    async fn poll_registration<C: atat::AtatCmd>(
        &mut self,
        cmd: &C,
        label: &str,
        retry_on: &[u8],
        budget: Duration,
        interval: Duration,
        start: &mut Instant,
    ) -> RegistrationStatus {
        loop {
            let status = self.query_status(cmd, label).await;
            debug!("[Connection] {} {:?}", label, status);
            if !retry_on.contains(&(status as u8)) || elapsed(start) >= budget {
                return status;
            }
            Timer::after(interval).await;
        }
    }

    /// A query that gets no answer counts as not registering.
    async fn query_status<C: atat::AtatCmd>(&mut self, cmd: &C, label: &str) -> RegistrationStatus {
        if self.dispatcher.send_command(cmd, &[label]).await.is_err() {
            return RegistrationStatus::NotRegistering;
        }
        if self
            .dispatcher
            .wait_for(&[CRLF], prompt_timeout())
            .await
            .is_err()
        {
            return RegistrationStatus::NotRegistering;
        }
        first_number::<u8>(self.dispatcher.response(), ",\r\n ")
            .map(RegistrationStatus::from)
            .unwrap_or(RegistrationStatus::NotRegistering)
    }
}

/// Time since `start`, re-baselining a start that lies in the future.
fn elapsed(start: &mut Instant) -> Duration {
    let now = Instant::now();
    if now < *start {
        *start = now;
    }
    now - *start
}

/// Address following `+IP: `, quotes optional.
fn parse_ip(response: &str) -> Option<IpAddr> {
    line_after(response, "+IP: ")?
        .trim()
        .trim_matches('"')
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{test_config, MockTransport};
    use no_std_net::Ipv4Addr;

    const ACTIVATION: [&str; 8] = [
        "\r\n#GPRS: 0\r\n\r\nOK\r\n",
        "\r\n+CREG: 0,2\r\n\r\nOK\r\n",
        "\r\n+CREG: 0,2\r\n\r\nOK\r\n",
        "\r\n+CREG: 0,1\r\n\r\nOK\r\n",
        "\r\n+CGREG: 0,5\r\n\r\nOK\r\n",
        "\r\nOK\r\n",
        "\r\nOK\r\n",
        "\r\nOK\r\n",
    ];

    #[tokio::test]
    async fn registers_on_third_poll_and_activates() {
        let mut mock = MockTransport::new(&ACTIVATION);
        mock.push_reply(b"\r\n+IP: 10.20.30.40\r\n\r\nOK\r\n");
        let mut dispatcher = Dispatcher::<_, 256>::new(mock);
        let config = test_config();
        let mut network = NetworkState::default();

        let res = Connection::new(&mut dispatcher, &config, &mut network)
            .check_data_connection(Duration::from_secs(1))
            .await;

        assert_eq!(res, Ok(()));
        assert_eq!(
            network.ip(),
            Some(IpAddr::V4(Ipv4Addr::new(10, 20, 30, 40)))
        );
        let commands = dispatcher.release().commands();
        assert_eq!(
            commands
                .iter()
                .filter(|c| c.as_str() == "AT+CREG?\r")
                .count(),
            3
        );
        assert!(commands.contains(&"AT+CGDCONT=1,\"IP\",\"internet\"\r".into()));
        assert_eq!(commands.last().map(|c| c.as_str()), Some("AT#GPRS=1\r"));
    }

    #[tokio::test]
    async fn active_context_returns_immediately() {
        let mock = MockTransport::new(&["\r\n#GPRS: 1\r\n\r\nOK\r\n"]);
        let mut dispatcher = Dispatcher::<_, 256>::new(mock);
        let config = test_config();
        let mut network = NetworkState::default();

        let res = Connection::new(&mut dispatcher, &config, &mut network)
            .check_data_connection(Duration::from_secs(1))
            .await;

        assert_eq!(res, Ok(()));
        assert_eq!(dispatcher.release().commands().len(), 1);
    }

    #[tokio::test]
    async fn denied_attach_is_not_retried() {
        let mock = MockTransport::new(&[
            "\r\n#GPRS: 0\r\n\r\nOK\r\n",
            "\r\n+CREG: 0,1\r\n\r\nOK\r\n",
            "\r\n+CGREG: 0,3\r\n\r\nOK\r\n",
        ]);
        let mut dispatcher = Dispatcher::<_, 256>::new(mock);
        let config = test_config();
        let mut network = NetworkState::default();

        let err = Connection::new(&mut dispatcher, &config, &mut network)
            .check_data_connection(Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(err, ConnectionError::NotAttached(RegistrationStatus::Denied));
        assert_eq!(err.code(), 9);
    }

    #[tokio::test]
    async fn registration_budget_expires() {
        let mock = MockTransport::new(&["\r\n#GPRS: 0\r\n\r\nOK\r\n"]);
        let mut dispatcher = Dispatcher::<_, 256>::new(mock);
        let config = test_config();
        let mut network = NetworkState::default();

        let err = Connection::new(&mut dispatcher, &config, &mut network)
            .check_data_connection(Duration::from_millis(0))
            .await
            .unwrap_err();

        // no +CREG answer at all counts as not registering, reported as 1
        assert_eq!(err.code(), 1);
    }

    #[tokio::test]
    async fn apn_failure_is_code_12() {
        let mock = MockTransport::new(&[
            "\r\n#GPRS: 0\r\n\r\nOK\r\n",
            "\r\n+CREG: 0,5\r\n\r\nOK\r\n",
            "\r\n+CGREG: 0,1\r\n\r\nOK\r\n",
            "\r\n+CME ERROR: 4\r\n",
        ]);
        let mut dispatcher = Dispatcher::<_, 256>::new(mock);
        let config = test_config();
        let mut network = NetworkState::default();

        let err = Connection::new(&mut dispatcher, &config, &mut network)
            .check_data_connection(Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(err.code(), 12);
        assert_eq!(dispatcher.last_error().value(), 4);
    }

    #[tokio::test]
    async fn eps_accepts_restricted_registration() {
        let mock = MockTransport::new(&[
            "\r\n+CEREG: 0,2\r\n\r\nOK\r\n",
            "\r\n+CEREG: 0,7\r\n\r\nOK\r\n",
        ]);
        let mut dispatcher = Dispatcher::<_, 256>::new(mock);
        let config = test_config();
        let mut network = NetworkState::default();

        let res = Connection::new(&mut dispatcher, &config, &mut network)
            .check_connection_eps(Duration::from_secs(1))
            .await;

        assert_eq!(res, Ok(()));
    }

    #[test]
    fn ip_with_and_without_quotes() {
        assert_eq!(
            parse_ip("\r\n+IP: \"192.168.1.2\"\r\n\r\nOK"),
            Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)))
        );
        assert_eq!(
            parse_ip("+IP: 1.2.3.4\r\n"),
            Some(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)))
        );
        assert_eq!(parse_ip("+IP: \r\n"), None);
        assert_eq!(parse_ip("OK"), None);
    }
}
