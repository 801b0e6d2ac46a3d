use embassy_time::Duration;
use embedded_hal::digital::{ErrorType, OutputPin};
use heapless::String;

use crate::buffer::truncated;

/// Placeholder for boards that do not wire the module's power key.
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Access point credentials used when defining the PDP context.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Apn {
    pub name: String<30>,
    pub login: String<30>,
    pub password: String<30>,
}

impl Apn {
    /// Values longer than 30 bytes are truncated.
    pub fn new(name: &str, login: &str, password: &str) -> Self {
        Self {
            name: truncated(name),
            login: truncated(login),
            password: truncated(password),
        }
    }
}

impl Default for Apn {
    fn default() -> Self {
        Self::new("APN", "user", "password")
    }
}

/// Poll intervals, ceilings and pauses of the session state machines.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Budget given to the data connection check run before opening
    /// sockets, FTP sessions and HTTP requests
    pub data_connection_budget: Duration,
    /// Interval between `+CREG?` / `+CGREG?` polls
    pub registration_poll: Duration,
    /// Interval between `+CEREG?` polls
    pub eps_poll: Duration,
    /// Interval between socket status polls
    pub socket_poll: Duration,
    /// How long a socket may take to change state after open, send or close
    pub socket_ceiling: Duration,
    /// Interval between checks for pending socket data
    pub receive_poll: Duration,
    /// Interval between socket table scans while waiting for a peer
    pub accept_poll: Duration,
    pub gps_poll: Duration,
    pub gps_hdop_poll: Duration,
    /// Pause before re-sending a command that did not succeed
    pub retry_pause: Duration,
    /// Pause between `#SSLH` attempts
    pub ssl_close_pause: Duration,
    /// Time the module needs after a FTP login or before the escape
    /// sequence ending an upload
    pub ftp_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            data_connection_budget: Duration::from_secs(60),
            registration_poll: Duration::from_secs(2),
            eps_poll: Duration::from_secs(1),
            socket_poll: Duration::from_secs(1),
            socket_ceiling: Duration::from_secs(10),
            receive_poll: Duration::from_millis(500),
            accept_poll: Duration::from_millis(500),
            gps_poll: Duration::from_millis(500),
            gps_hdop_poll: Duration::from_secs(1),
            retry_pause: Duration::from_secs(1),
            ssl_close_pause: Duration::from_secs(3),
            ftp_settle: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub apn: Apn,
    pub timing: Timing,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_apn(self, name: &str, login: &str, password: &str) -> Self {
        Self {
            apn: Apn::new(name, login, password),
            ..self
        }
    }

    #[must_use]
    pub fn with_timing(self, timing: Timing) -> Self {
        Self { timing, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_apn() {
        let config = Config::new();
        assert_eq!(config.apn.name.as_str(), "APN");
        assert_eq!(config.apn.login.as_str(), "user");
        assert_eq!(config.apn.password.as_str(), "password");
        assert_eq!(config.timing.registration_poll, Duration::from_secs(2));
    }

    #[test]
    fn long_values_are_truncated() {
        let config = Config::new().with_apn("internet.operator.example.com.long", "", "secret");
        assert_eq!(config.apn.name.len(), 30);
        assert_eq!(config.apn.name.as_str(), "internet.operator.example.com.");
        assert!(config.apn.login.is_empty());
        assert_eq!(config.apn.password.as_str(), "secret");
    }
}
