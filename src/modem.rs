use embedded_io_async::{Read, ReadReady, Write};

use crate::config::Config;
use crate::connection::{Connection, NetworkState};
use crate::device::Device;
use crate::dispatcher::Dispatcher;
use crate::ftp::Ftp;
use crate::gps::{Gps, GpsFix};
use crate::http::Http;
use crate::sms::Sms;
use crate::socket::{SocketTable, Sockets};

/// Driver for one module on one serial link.
///
/// The modem owns the link and the state shared between services. Each
/// service is a short lived view borrowing the modem, so only one command
/// is in flight at a time.
///
/// ```ignore
/// let mut modem = Modem::<_, 1024>::new(uart, Config::new().with_apn("internet", "", ""));
/// modem.device().on().await?;
/// modem.connection().check_data_connection(Duration::from_secs(60)).await?;
/// ```
pub struct Modem<T, const N: usize = 1024> {
    dispatcher: Dispatcher<T, N>,
    config: Config,
    network: NetworkState,
    sockets: SocketTable,
    gps_fix: GpsFix,
}

impl<T, const N: usize> Modem<T, N>
where
    T: Read + Write + ReadReady,
{
    pub fn new(transport: T, config: Config) -> Self {
        Self {
            dispatcher: Dispatcher::new(transport),
            config,
            network: NetworkState::default(),
            sockets: SocketTable::default(),
            gps_fix: GpsFix::default(),
        }
    }

    /// Give the serial link back.
    pub fn release(self) -> T {
        self.dispatcher.release()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Raw command access for anything the services do not cover.
    pub fn dispatcher(&mut self) -> &mut Dispatcher<T, N> {
        &mut self.dispatcher
    }

    pub fn device(&mut self) -> Device<'_, T, N> {
        Device::new(
            &mut self.dispatcher,
            &self.config,
            &mut self.network,
            &mut self.sockets,
        )
    }

    pub fn connection(&mut self) -> Connection<'_, T, N> {
        Connection::new(&mut self.dispatcher, &self.config, &mut self.network)
    }

    pub fn sockets(&mut self) -> Sockets<'_, T, N> {
        Sockets::new(
            &mut self.dispatcher,
            &self.config,
            &mut self.network,
            &mut self.sockets,
        )
    }

    pub fn ftp(&mut self) -> Ftp<'_, T, N> {
        Ftp::new(&mut self.dispatcher, &self.config, &mut self.network)
    }

    pub fn http(&mut self) -> Http<'_, T, N> {
        Http::new(&mut self.dispatcher, &self.config, &mut self.network)
    }

    pub fn gps(&mut self) -> Gps<'_, T, N> {
        Gps::new(
            &mut self.dispatcher,
            &self.config,
            &mut self.network,
            &mut self.gps_fix,
        )
    }

    pub fn sms(&mut self) -> Sms<'_, T, N> {
        Sms::new(&mut self.dispatcher, &self.config, &mut self.network)
    }
}

#[cfg(test)]
mod tests {
    use embassy_time::Duration;

    use super::*;
    use crate::socket::SocketId;
    use crate::test_helpers::{test_config, MockTransport};

    #[tokio::test]
    async fn services_share_the_link() {
        let mut modem = Modem::<_, 512>::new(
            MockTransport::new(&[
                "\r\nOK\r\n",
                "\r\nOK\r\n",
                "\r\nOK\r\n",
                "\r\n#GPRS: 1\r\n\r\nOK\r\n",
                "\r\n#SS: 1,0\r\n\r\nOK\r\n",
            ]),
            test_config(),
        );

        modem.device().on().await.unwrap();
        modem
            .connection()
            .check_data_connection(Duration::from_millis(100))
            .await
            .unwrap();
        let status = modem
            .sockets()
            .status(SocketId::new(1).unwrap())
            .await
            .unwrap();

        assert_eq!(status.id, 1);
        let mock = modem.release();
        assert_eq!(mock.replies_left(), 0);
        assert_eq!(
            mock.commands(),
            ["AT\r", "AT+CMEE=1\r", "ATE0\r", "AT#GPRS?\r", "AT#SS=1\r"]
        );
    }
}
