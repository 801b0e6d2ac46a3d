use embassy_time::{Duration, Instant, Timer};
use embedded_io_async::{Read, ReadReady, Write};

use super::{
    CloseError, PollError, SecurityDataError, SendError, SslError, SslReceiveError, SslSocketId,
    SslState, SslStatus, Sockets, MAX_DL_PAYLOAD,
};
use crate::buffer::{first_number, line_after};
use crate::command::ssl::types::{SecurityDataAction, SecurityDataType};
use crate::command::ssl::{
    GetSslStatus, ManageSecurityData, SetSslEnable, SslDial, SslReceive, SslSend, SslShutdown,
};
use crate::dispatcher::{CRLF, CTRL_Z, ERROR, ERROR_CODE, RESULT_CODES};
use crate::error::Error;
use crate::module_timing::{payload_ack_timeout, payload_timeout, prompt_timeout};

impl<'a, T, const N: usize> Sockets<'a, T, N>
where
    T: Read + Write + ReadReady,
{
    pub async fn ssl_status(&mut self, id: SslSocketId) -> Result<SslStatus, Error> {
        self.table.ssl = SslStatus {
            id: id.get(),
            ..SslStatus::default()
        };
        self.dispatcher
            .expect_ok(&GetSslStatus { ssid: id.get() })
            .await?;
        let status = line_after(self.dispatcher.response(), "#SSLS: ")
            .and_then(SslStatus::parse)
            .ok_or(Error::Parse)?;
        self.table.ssl = status;
        Ok(status)
    }

    /// Open the SSL socket to `host`.
    ///
    /// Certificates have to be in place already, see
    /// [`Self::manage_ssl`].
    pub async fn open_ssl(
        &mut self,
        id: SslSocketId,
        host: &str,
        port: u16,
    ) -> Result<(), SslError> {
        // The module refuses to enable an already enabled channel.
        if self
            .dispatcher
            .expect_ok(&SetSslEnable {
                ssid: id.get(),
                enable: 1,
            })
            .await
            .is_err()
        {
            debug!("[SSL] channel already enabled");
        }

        let budget = self.config.timing.data_connection_budget;
        self.connection().check_data_connection(budget).await?;

        let state = self.ssl_status(id).await.map_err(SslError::Status)?.state;
        if state != SslState::Closed {
            warn!("[SSL] socket is {:?}", state);
            return Err(SslError::NotClosed(state));
        }

        debug!("[SSL] dialing {}:{}", host, port);
        self.dispatcher
            .expect_ok(&SslDial {
                ssid: id.get(),
                remote_port: port,
                remote_host: host,
                closure_type: 0,
                conn_mode: 1,
            })
            .await
            .map_err(SslError::Dial)?;

        self.wait_ssl_state(id, false, SslState::Open)
            .await
            .map_err(|_| SslError::Timeout)
    }

    /// Close the SSL socket and disable the channel. Closing a closed socket
    /// does nothing.
    pub async fn close_ssl(&mut self, id: SslSocketId) -> Result<(), CloseError> {
        if let Ok(status) = self.ssl_status(id).await {
            if status.state == SslState::Closed {
                return Ok(());
            }
        }

        let mut res = self.dispatcher.expect_ok(&SslShutdown { ssid: id.get() }).await;
        for _ in 0..3 {
            if res.is_ok() {
                break;
            }
            Timer::after(self.config.timing.ssl_close_pause).await;
            res = self.dispatcher.expect_ok(&SslShutdown { ssid: id.get() }).await;
        }
        res.map_err(CloseError::Shutdown)?;

        self.wait_ssl_state(id, true, SslState::Closed)
            .await
            .map_err(|e| match e {
                PollError::Status(e) => CloseError::Status(e),
                PollError::Timeout => CloseError::Timeout,
            })?;

        self.dispatcher
            .expect_ok(&SetSslEnable {
                ssid: id.get(),
                enable: 0,
            })
            .await
            .map_err(CloseError::Shutdown)
    }

    pub async fn send_ssl(&mut self, id: SslSocketId, data: &[u8]) -> Result<(), SendError> {
        let state = self.ssl_status(id).await.map_err(SendError::Status)?.state;
        if state != SslState::Open {
            return Err(SendError::InvalidState);
        }

        let patterns = [">", ERROR_CODE, ERROR];
        let index = self
            .dispatcher
            .send_command(&SslSend { ssid: id.get() }, &patterns)
            .await
            .map_err(SendError::Prompt)?;
        if index != 0 {
            return Err(SendError::Prompt(
                self.dispatcher.failure(patterns[index]).await,
            ));
        }

        let index = self
            .dispatcher
            .send_terminated(data, CTRL_Z, &RESULT_CODES, payload_ack_timeout())
            .await
            .map_err(SendError::Payload)?;
        self.dispatcher
            .result_code(RESULT_CODES[index])
            .await
            .map_err(SendError::Payload)?;

        self.wait_ssl_state(id, true, SslState::Open)
            .await
            .map_err(|e| match e {
                PollError::Status(e) => SendError::Flush(e),
                PollError::Timeout => SendError::Timeout,
            })
    }

    /// Read data from the SSL socket, asking again while the module reports
    /// `TIMEOUT` and `timeout` has not passed.
    pub async fn receive_ssl(
        &mut self,
        id: SslSocketId,
        timeout: Duration,
    ) -> Result<&[u8], SslReceiveError> {
        let start = Instant::now();
        let patterns = ["#SSLRECV: ", "TIMEOUT\r\n", "DISCONNECTED\r\n", ERROR_CODE];
        loop {
            let cmd = SslReceive {
                ssid: id.get(),
                max_bytes: MAX_DL_PAYLOAD,
            };
            match self.dispatcher.send_command(&cmd, &patterns).await {
                Ok(0) => break,
                Ok(1) => {
                    if start.elapsed() >= timeout {
                        return Err(SslReceiveError::NoData);
                    }
                    Timer::after(self.config.timing.receive_poll).await;
                }
                Ok(2) => return Err(SslReceiveError::Disconnected),
                Ok(_) => {
                    return Err(SslReceiveError::Module(
                        self.dispatcher.failure(ERROR_CODE).await,
                    ))
                }
                Err(_) => return Err(SslReceiveError::NoData),
            }
        }

        self.dispatcher
            .wait_for(&[CRLF], prompt_timeout())
            .await
            .map_err(|_| SslReceiveError::Header)?;
        let count: usize =
            first_number(self.dispatcher.response(), " \r\n").ok_or(SslReceiveError::Header)?;

        self.dispatcher
            .read_raw(count, payload_timeout())
            .await
            .map_err(|_| SslReceiveError::BadLength)
    }

    /// Store, read or delete a certificate or key in the module's
    /// non-volatile memory.
    ///
    /// Reading returns the stored text, the other actions an empty string.
    pub async fn manage_ssl(
        &mut self,
        id: SslSocketId,
        action: SecurityDataAction,
        data_type: SecurityDataType,
        data: Option<&[u8]>,
    ) -> Result<&str, SecurityDataError> {
        if self
            .dispatcher
            .expect_ok(&SetSslEnable {
                ssid: id.get(),
                enable: 1,
            })
            .await
            .is_err()
        {
            debug!("[SSL] channel already enabled");
        }

        match action {
            SecurityDataAction::Store => {
                let data = data.ok_or(SecurityDataError::MissingData)?;
                let patterns = [">", ERROR_CODE, ERROR];
                let cmd = ManageSecurityData {
                    ssid: id.get(),
                    action,
                    data_type,
                    size: Some(data.len()),
                };
                let index = self
                    .dispatcher
                    .send_command(&cmd, &patterns)
                    .await
                    .map_err(SecurityDataError::Prompt)?;
                if index != 0 {
                    return Err(SecurityDataError::Prompt(
                        self.dispatcher.failure(patterns[index]).await,
                    ));
                }

                let index = self
                    .dispatcher
                    .send_terminated(data, CTRL_Z, &RESULT_CODES, payload_ack_timeout())
                    .await
                    .map_err(SecurityDataError::Store)?;
                self.dispatcher
                    .result_code(RESULT_CODES[index])
                    .await
                    .map_err(SecurityDataError::Store)?;
                Ok("")
            }
            SecurityDataAction::Read => {
                let patterns = ["#SSLSECDATA: ", ERROR_CODE, ERROR];
                let cmd = ManageSecurityData {
                    ssid: id.get(),
                    action,
                    data_type,
                    size: None,
                };
                let index = self
                    .dispatcher
                    .send_command(&cmd, &patterns)
                    .await
                    .map_err(SecurityDataError::Read)?;
                if index != 0 {
                    return Err(SecurityDataError::Read(
                        self.dispatcher.failure(patterns[index]).await,
                    ));
                }
                self.dispatcher
                    .wait_for(&["\r\nOK\r\n"], payload_ack_timeout())
                    .await
                    .map_err(SecurityDataError::Read)?;

                let text = self.dispatcher.response();
                let text = text.strip_suffix("\r\nOK\r\n").unwrap_or(text);
                Ok(text
                    .split_once(CRLF)
                    .map(|(_, body)| body.trim_end())
                    .unwrap_or(""))
            }
            SecurityDataAction::Delete => {
                let cmd = ManageSecurityData {
                    ssid: id.get(),
                    action,
                    data_type,
                    size: None,
                };
                self.dispatcher
                    .expect_ok(&cmd)
                    .await
                    .map_err(SecurityDataError::Delete)?;
                Ok("")
            }
        }
    }

    async fn wait_ssl_state(
        &mut self,
        id: SslSocketId,
        fail_on_query: bool,
        wanted: SslState,
    ) -> Result<(), PollError> {
        let start = Instant::now();
        loop {
            match self.ssl_status(id).await {
                Ok(status) if status.state == wanted => return Ok(()),
                Ok(_) => {}
                Err(e) if fail_on_query => return Err(PollError::Status(e)),
                Err(_) => {}
            }
            if start.elapsed() >= self.config.timing.socket_ceiling {
                warn!("[SSL] socket did not reach {:?}", wanted);
                return Err(PollError::Timeout);
            }
            Timer::after(self.config.timing.socket_poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::connection::NetworkState;
    use crate::dispatcher::Dispatcher;
    use crate::socket::SocketTable;
    use crate::test_helpers::{test_config, MockTransport};

    struct Fixture {
        dispatcher: Dispatcher<MockTransport, 1024>,
        config: Config,
        network: NetworkState,
        table: SocketTable,
    }

    impl Fixture {
        fn new(replies: &[&str]) -> Self {
            Self {
                dispatcher: Dispatcher::new(MockTransport::new(replies)),
                config: test_config(),
                network: NetworkState::default(),
                table: SocketTable::default(),
            }
        }

        fn sockets(&mut self) -> Sockets<'_, MockTransport, 1024> {
            Sockets::new(
                &mut self.dispatcher,
                &self.config,
                &mut self.network,
                &mut self.table,
            )
        }
    }

    #[tokio::test]
    async fn open_ssl_ignores_enable_error() {
        let mut fx = Fixture::new(&[
            "\r\n+CME ERROR: 1003\r\n",
            "\r\n#GPRS: 1\r\n\r\nOK\r\n",
            "\r\n#SSLS: 1,1\r\n\r\nOK\r\n",
            "\r\nOK\r\n",
            "\r\n#SSLS: 1,2,1\r\n\r\nOK\r\n",
        ]);

        let res = fx
            .sockets()
            .open_ssl(SslSocketId::FIRST, "example.com", 443)
            .await;

        assert_eq!(res, Ok(()));
        assert_eq!(fx.table.ssl().state, SslState::Open);
        assert!(fx
            .dispatcher
            .release()
            .commands()
            .contains(&"AT#SSLD=1,443,\"example.com\",0,1\r".into()));
    }

    #[tokio::test]
    async fn open_ssl_on_open_socket_is_code_18() {
        let mut fx = Fixture::new(&[
            "\r\nOK\r\n",
            "\r\n#GPRS: 1\r\n\r\nOK\r\n",
            "\r\n#SSLS: 1,2\r\n\r\nOK\r\n",
        ]);

        let err = fx
            .sockets()
            .open_ssl(SslSocketId::FIRST, "example.com", 443)
            .await
            .unwrap_err();

        assert_eq!(err.code(), 18);
    }

    #[tokio::test]
    async fn close_ssl_retries_shutdown() {
        let mut fx = Fixture::new(&[
            "\r\n#SSLS: 1,2\r\n\r\nOK\r\n",
            "\r\nERROR\r\n",
            "\r\nOK\r\n",
            "\r\n#SSLS: 1,1\r\n\r\nOK\r\n",
            "\r\nOK\r\n",
        ]);

        let res = fx.sockets().close_ssl(SslSocketId::FIRST).await;

        assert_eq!(res, Ok(()));
        let commands = fx.dispatcher.release().commands();
        assert_eq!(
            commands,
            [
                "AT#SSLS=1\r",
                "AT#SSLH=1\r",
                "AT#SSLH=1\r",
                "AT#SSLS=1\r",
                "AT#SSLEN=1,0\r"
            ]
        );
    }

    #[tokio::test]
    async fn send_ssl_terminates_with_ctrl_z() {
        let mut fx = Fixture::new(&[
            "\r\n#SSLS: 1,2\r\n\r\nOK\r\n",
            "\r\n> ",
            "\r\nOK\r\n",
            "\r\n#SSLS: 1,2\r\n\r\nOK\r\n",
        ]);

        let res = fx.sockets().send_ssl(SslSocketId::FIRST, b"GET /").await;

        assert_eq!(res, Ok(()));
        let flushes = fx.dispatcher.release().flushes();
        assert_eq!(flushes[2], "GET /\u{1a}");
    }

    #[tokio::test]
    async fn receive_ssl_retries_on_module_timeout() {
        let mut fx = Fixture::new(&[
            "\r\nTIMEOUT\r\n\r\nOK\r\n",
            "\r\n#SSLRECV: 5\r\nhello\r\n\r\nOK\r\n",
        ]);

        let data = fx
            .sockets()
            .receive_ssl(SslSocketId::FIRST, Duration::from_millis(200))
            .await
            .unwrap()
            .to_vec();

        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn receive_ssl_disconnected_is_code_2() {
        let mut fx = Fixture::new(&["\r\nDISCONNECTED\r\n\r\nOK\r\n"]);

        let err = fx
            .sockets()
            .receive_ssl(SslSocketId::FIRST, Duration::from_millis(200))
            .await
            .unwrap_err();

        assert_eq!(err.code(), 2);
    }

    #[tokio::test]
    async fn store_certificate() {
        let mut fx = Fixture::new(&["\r\nOK\r\n", "\r\n> ", "\r\nOK\r\n"]);

        let res = fx
            .sockets()
            .manage_ssl(
                SslSocketId::FIRST,
                SecurityDataAction::Store,
                SecurityDataType::CaCertificate,
                Some(b"-----BEGIN CERTIFICATE-----"),
            )
            .await
            .map(|s| s.len());

        assert_eq!(res, Ok(0));
        let flushes = fx.dispatcher.release().flushes();
        assert_eq!(flushes[1], "AT#SSLSECDATA=1,1,1,27\r");
    }

    #[tokio::test]
    async fn read_certificate() {
        let mut fx = Fixture::new(&[
            "\r\nOK\r\n",
            "\r\n#SSLSECDATA: 1,1\r\n-----BEGIN CERTIFICATE-----\r\n\r\nOK\r\n",
        ]);

        let mut sockets = fx.sockets();
        let text = sockets
            .manage_ssl(
                SslSocketId::FIRST,
                SecurityDataAction::Read,
                SecurityDataType::CaCertificate,
                None,
            )
            .await
            .unwrap();

        assert_eq!(text, "-----BEGIN CERTIFICATE-----");
    }
}
