//! TCP and UDP sockets handled by the module's internal stack.
//!
//! Sockets are driven in command mode: data is pushed with `#SSENDEXT` and
//! pulled with `#SRECV`, so the serial link stays available for other
//! commands while a socket is open.

mod error;
mod ssl;
pub mod types;

pub use error::{
    AcceptError, CloseError, OpenError, ReceiveError, SecurityDataError, SendError, SslError,
    SslReceiveError,
};
pub use types::{
    SocketId, SocketInfo, SocketState, SocketStatus, SocketTable, SslSocketId, SslState, SslStatus,
    MAX_SOCKETS,
};

use core::fmt::Write as _;

use embassy_time::{Instant, Timer};
use embedded_io_async::{Read, ReadReady, Write};
use heapless::{String, Vec};

use crate::buffer::{first_number, line_after};
use crate::command::socket::types::{ClosureType, ConnectionMode, ListenState, SocketProtocol};
use crate::command::socket::{
    GetAllSocketStatus, GetSocketInfo, GetSocketStatus, ReceiveData, SendDataExt,
    SetSocketConfigExt, SetSocketConfigExt3, SocketAccept, SocketDial, SocketListen,
    SocketListenUdp, SocketShutdown,
};
use crate::config::Config;
use crate::connection::{Connection, NetworkState};
use crate::dispatcher::{Dispatcher, CRLF, ERROR, ERROR_CODE, RESULT_CODES};
use crate::error::Error;
use crate::module_timing::{payload_ack_timeout, payload_timeout, prompt_timeout};

/// Largest chunk requested from the module in one read
pub const MAX_DL_PAYLOAD: usize = 490;

/// Failure while waiting for a socket to change state.
enum PollError {
    Status(Error),
    Timeout,
}

pub struct Sockets<'a, T, const N: usize> {
    dispatcher: &'a mut Dispatcher<T, N>,
    config: &'a Config,
    network: &'a mut NetworkState,
    table: &'a mut SocketTable,
}

impl<'a, T, const N: usize> Sockets<'a, T, N>
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

    fn connection(&mut self) -> Connection<'_, T, N> {
        Connection::new(self.dispatcher, self.config, self.network)
    }

    pub fn table(&self) -> &SocketTable {
        &*self.table
    }

    /// Refresh and return the status of one socket.
    pub async fn status(&mut self, id: SocketId) -> Result<SocketStatus, Error> {
        let slot = &mut self.table.status[id.index()];
        *slot = SocketStatus {
            id: id.get(),
            ..SocketStatus::default()
        };
        self.dispatcher
            .expect_ok(&GetSocketStatus { conn_id: id.get() })
            .await?;
        let status = line_after(self.dispatcher.response(), "#SS: ")
            .and_then(SocketStatus::parse)
            .ok_or(Error::Parse)?;
        self.table.status[id.index()] = status;
        Ok(status)
    }

    /// Refresh the status of every socket.
    pub async fn status_all(&mut self) -> Result<&SocketTable, Error> {
        for (i, slot) in self.table.status.iter_mut().enumerate() {
            *slot = SocketStatus {
                id: i as u8 + 1,
                ..SocketStatus::default()
            };
        }
        self.dispatcher.expect_ok(&GetAllSocketStatus).await?;
        for line in self.dispatcher.response().split(CRLF) {
            let Some(status) = line.strip_prefix("#SS: ").and_then(SocketStatus::parse) else {
                continue;
            };
            if let Some(id) = SocketId::new(status.id) {
                self.table.status[id.index()] = status;
            }
        }
        Ok(&*self.table)
    }

    /// Refresh and return the byte counters of one socket.
    pub async fn info(&mut self, id: SocketId) -> Result<SocketInfo, Error> {
        self.table.info[id.index()] = SocketInfo {
            id: id.get(),
            ..SocketInfo::default()
        };
        self.dispatcher
            .expect_ok(&GetSocketInfo { conn_id: id.get() })
            .await?;
        let info = line_after(self.dispatcher.response(), "#SI: ")
            .and_then(SocketInfo::parse)
            .ok_or(Error::Parse)?;
        self.table.info[id.index()] = info;
        Ok(info)
    }

    /// Connect a socket to a remote host.
    ///
    /// A `local_port` of `0` uses `remote_port`. `keep_alive` is given in
    /// minutes, `0` disables it.
    pub async fn open_client(
        &mut self,
        id: SocketId,
        protocol: SocketProtocol,
        host: &str,
        remote_port: u16,
        local_port: u16,
        keep_alive: u8,
    ) -> Result<(), OpenError> {
        self.prepare_open(id, keep_alive).await?;

        self.dispatcher
            .expect_ok(&SetSocketConfigExt3 {
                conn_id: id.get(),
                immediate_rsp: 1,
            })
            .await
            .map_err(OpenError::ConfigExt3)?;

        debug!("[Socket] dialing {} on socket {}", host, id.get());
        let local_port = if local_port == 0 {
            remote_port
        } else {
            local_port
        };
        self.dispatcher
            .expect_ok(&SocketDial {
                conn_id: id.get(),
                protocol,
                remote_port,
                remote_host: host,
                closure_type: ClosureType::Immediate,
                local_port,
                conn_mode: ConnectionMode::Command,
            })
            .await
            .map_err(OpenError::Dial)?;

        self.wait_state(id, false, |s| {
            matches!(
                s,
                SocketState::Suspended | SocketState::SuspendedWithPendingData
            )
        })
        .await
        .map_err(|_| OpenError::Timeout)
    }

    /// Listen for incoming connections on `local_port`.
    pub async fn open_server(
        &mut self,
        id: SocketId,
        protocol: SocketProtocol,
        local_port: u16,
        keep_alive: u8,
    ) -> Result<(), OpenError> {
        self.prepare_open(id, keep_alive).await?;

        debug!("[Socket] listening on port {}", local_port);
        let res = match protocol {
            SocketProtocol::Tcp => {
                self.dispatcher
                    .expect_ok(&SocketListen {
                        conn_id: id.get(),
                        listen_state: ListenState::Start,
                        listen_port: local_port,
                        closure_type: ClosureType::AfterEscape,
                    })
                    .await
            }
            SocketProtocol::Udp => {
                self.dispatcher
                    .expect_ok(&SocketListenUdp {
                        conn_id: id.get(),
                        listen_state: ListenState::Start,
                        listen_port: local_port,
                    })
                    .await
            }
        };
        res.map_err(OpenError::Dial)
    }

    /// Steps shared by client and server sockets: data connection, closed
    /// state and extended configuration.
    async fn prepare_open(&mut self, id: SocketId, keep_alive: u8) -> Result<(), OpenError> {
        let budget = self.config.timing.data_connection_budget;
        self.connection().check_data_connection(budget).await?;

        let state = self.status(id).await.map_err(OpenError::Status)?.state;
        if state != SocketState::Closed {
            warn!("[Socket] socket {} is {:?}", id.get(), state);
            return Err(OpenError::NotClosed(state));
        }

        self.dispatcher
            .expect_ok(&SetSocketConfigExt {
                conn_id: id.get(),
                sring_mode: 0,
                recv_data_mode: 0,
                keepalive: keep_alive,
            })
            .await
            .map_err(OpenError::ConfigExt)
    }

    /// Send `data` and wait until the module has pushed it out.
    pub async fn send(&mut self, id: SocketId, data: &[u8]) -> Result<(), SendError> {
        let state = self.status(id).await.map_err(SendError::Status)?.state;
        if !matches!(
            state,
            SocketState::Active | SocketState::Suspended | SocketState::SuspendedWithPendingData
        ) {
            return Err(SendError::InvalidState);
        }

        let patterns = [">", ERROR_CODE, ERROR];
        let index = self
            .dispatcher
            .send_command(
                &SendDataExt {
                    conn_id: id.get(),
                    length: data.len(),
                },
                &patterns,
            )
            .await
            .map_err(SendError::Prompt)?;
        if index != 0 {
            return Err(SendError::Prompt(
                self.dispatcher.failure(patterns[index]).await,
            ));
        }

        let index = self
            .dispatcher
            .send_raw(data, &RESULT_CODES, payload_ack_timeout())
            .await
            .map_err(SendError::Payload)?;
        self.dispatcher
            .result_code(RESULT_CODES[index])
            .await
            .map_err(SendError::Payload)?;

        self.wait_state(id, true, |s| s == SocketState::Suspended)
            .await
            .map_err(|e| match e {
                PollError::Status(e) => SendError::Flush(e),
                PollError::Timeout => SendError::Timeout,
            })
    }

    /// Read pending data, waiting up to `timeout` for some to arrive. A zero
    /// timeout checks once.
    pub async fn receive(
        &mut self,
        id: SocketId,
        timeout: embassy_time::Duration,
    ) -> Result<&[u8], ReceiveError> {
        let start = Instant::now();
        let pending = loop {
            let info = self.info(id).await.map_err(|_| ReceiveError::NoData)?;
            if info.pending > 0 {
                break info.pending as usize;
            }
            if start.elapsed() >= timeout {
                return Err(ReceiveError::NoData);
            }
            Timer::after(self.config.timing.receive_poll).await;
        };

        let mut header: String<16> = String::new();
        let _ = write!(header, "#SRECV: {},", id.get());
        let patterns = [header.as_str(), ERROR_CODE, ERROR];
        let index = self
            .dispatcher
            .send_command_with_timeout(
                &ReceiveData {
                    conn_id: id.get(),
                    max_bytes: pending.min(MAX_DL_PAYLOAD),
                },
                &patterns,
                prompt_timeout(),
            )
            .await
            .map_err(ReceiveError::Request)?;
        if index != 0 {
            return Err(ReceiveError::Request(
                self.dispatcher.failure(patterns[index]).await,
            ));
        }

        self.dispatcher
            .wait_for(&[CRLF], prompt_timeout())
            .await
            .map_err(|_| ReceiveError::Header)?;
        let count: usize =
            first_number(self.dispatcher.response(), " \r\n").ok_or(ReceiveError::Header)?;
        trace!("[Socket] reading {} bytes", count);

        self.dispatcher
            .read_raw(count, payload_timeout())
            .await
            .map_err(|_| ReceiveError::BadLength)
    }

    /// Close a client socket. Closing a closed socket does nothing.
    pub async fn close_client(&mut self, id: SocketId) -> Result<(), CloseError> {
        if let Ok(status) = self.status(id).await {
            if status.state == SocketState::Closed {
                return Ok(());
            }
        }

        self.dispatcher
            .expect_ok(&SocketShutdown { conn_id: id.get() })
            .await
            .map_err(CloseError::Shutdown)?;

        self.wait_state(id, true, |s| s == SocketState::Closed)
            .await
            .map_err(|e| match e {
                PollError::Status(e) => CloseError::Status(e),
                PollError::Timeout => CloseError::Timeout,
            })
    }

    /// Stop listening on a server socket, then close it.
    pub async fn close_server(
        &mut self,
        id: SocketId,
        protocol: SocketProtocol,
    ) -> Result<(), CloseError> {
        let local_port = match self.status(id).await {
            Ok(status) if status.state == SocketState::Closed => return Ok(()),
            Ok(status) => status.local_port,
            Err(_) => self.table.status[id.index()].local_port,
        };

        let res = match protocol {
            SocketProtocol::Tcp => {
                self.dispatcher
                    .expect_ok(&SocketListen {
                        conn_id: id.get(),
                        listen_state: ListenState::Stop,
                        listen_port: local_port,
                        closure_type: ClosureType::AfterEscape,
                    })
                    .await
            }
            SocketProtocol::Udp => {
                self.dispatcher
                    .expect_ok(&SocketListenUdp {
                        conn_id: id.get(),
                        listen_state: ListenState::Stop,
                        listen_port: local_port,
                    })
                    .await
            }
        };
        res.map_err(CloseError::Shutdown)?;

        self.close_client(id).await
    }

    /// Accept the pending connection of a listening socket.
    pub async fn accept(&mut self, id: SocketId) -> Result<(), AcceptError> {
        let state = self.status(id).await.map_err(AcceptError::Status)?.state;
        if state != SocketState::IncomingPending {
            return Err(AcceptError::NothingPending);
        }
        self.dispatcher
            .expect_ok(&SocketAccept {
                conn_id: id.get(),
                conn_mode: ConnectionMode::Command,
            })
            .await
            .map_err(AcceptError::Accept)?;
        self.status(id).await.map_err(AcceptError::Status)?;
        Ok(())
    }

    /// Wait up to `wait` for peers to connect to listening sockets and
    /// accept all of them. Returns the accepted sockets.
    pub async fn manage_sockets(
        &mut self,
        wait: embassy_time::Duration,
    ) -> Result<Vec<SocketId, MAX_SOCKETS>, AcceptError> {
        let start = Instant::now();
        let pending = loop {
            self.status_all().await.map_err(AcceptError::Status)?;
            let pending: Vec<SocketId, MAX_SOCKETS> = SocketId::all()
                .filter(|id| self.table.status[id.index()].state == SocketState::IncomingPending)
                .collect();
            if !pending.is_empty() || start.elapsed() >= wait {
                break pending;
            }
            Timer::after(self.config.timing.accept_poll).await;
        };

        for id in pending.iter() {
            info!("[Socket] accepting connection on socket {}", id.get());
            self.dispatcher
                .expect_ok(&SocketAccept {
                    conn_id: id.get(),
                    conn_mode: ConnectionMode::Command,
                })
                .await
                .map_err(AcceptError::Accept)?;
        }

        self.status_all().await.map_err(AcceptError::Status)?;
        if pending.is_empty() {
            Err(AcceptError::NothingPending)
        } else {
            Ok(pending)
        }
    }

    /// Poll the socket status until `done` accepts it.
    async fn wait_state(
        &mut self,
        id: SocketId,
        fail_on_query: bool,
        done: impl Fn(SocketState) -> bool,
    ) -> Result<(), PollError> {
        let start = Instant::now();
        loop {
            match self.status(id).await {
                Ok(status) if done(status.state) => return Ok(()),
                Ok(_) => {}
                Err(e) if fail_on_query => return Err(PollError::Status(e)),
                Err(_) => {}
            }
            if start.elapsed() >= self.config.timing.socket_ceiling {
                warn!("[Socket] socket {} did not settle", id.get());
                return Err(PollError::Timeout);
            }
            Timer::after(self.config.timing.socket_poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{test_config, MockTransport};
    use embassy_time::Duration;

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

        fn commands(self) -> std::vec::Vec<std::string::String> {
            self.dispatcher.release().commands()
        }
    }

    fn id(n: u8) -> SocketId {
        SocketId::new(n).unwrap()
    }

    #[tokio::test]
    async fn closing_a_closed_socket_sends_nothing_else() {
        let mut fx = Fixture::new(&["\r\n#SS: 2,0\r\n\r\nOK\r\n"]);

        let res = fx.sockets().close_client(id(2)).await;

        assert_eq!(res, Ok(()));
        assert_eq!(fx.commands(), ["AT#SS=2\r"]);
    }

    #[tokio::test]
    async fn closing_a_closed_server_skips_listen_stop() {
        let mut fx = Fixture::new(&["\r\n#SS: 4,0\r\n\r\nOK\r\n", "\r\nERROR\r\n"]);

        let res = fx
            .sockets()
            .close_server(id(4), SocketProtocol::Tcp)
            .await;

        assert_eq!(res, Ok(()));
        assert_eq!(fx.commands(), ["AT#SS=4\r"]);
    }

    #[tokio::test]
    async fn close_waits_for_closed_state() {
        let mut fx = Fixture::new(&[
            "\r\n#SS: 1,2,10.0.0.5,3000,1.2.3.4,80\r\n\r\nOK\r\n",
            "\r\nOK\r\n",
            "\r\n#SS: 1,2,10.0.0.5,3000,1.2.3.4,80\r\n\r\nOK\r\n",
            "\r\n#SS: 1,0\r\n\r\nOK\r\n",
        ]);

        let res = fx.sockets().close_client(id(1)).await;

        assert_eq!(res, Ok(()));
        assert_eq!(
            fx.commands(),
            ["AT#SS=1\r", "AT#SH=1\r", "AT#SS=1\r", "AT#SS=1\r"]
        );
    }

    #[tokio::test]
    async fn opening_a_listening_socket_is_code_20() {
        let mut fx = Fixture::new(&[
            "\r\n#GPRS: 1\r\n\r\nOK\r\n",
            "\r\n#SS: 3,4,10.0.0.5,8080,0.0.0.0,0\r\n\r\nOK\r\n",
        ]);

        let err = fx
            .sockets()
            .open_client(id(3), SocketProtocol::Tcp, "example.com", 80, 0, 0)
            .await
            .unwrap_err();

        assert_eq!(err, OpenError::NotClosed(SocketState::Listening));
        assert_eq!(err.code(), 20);
    }

    #[tokio::test]
    async fn open_client_dials_and_waits_for_suspended() {
        let mut fx = Fixture::new(&[
            "\r\n#GPRS: 1\r\n\r\nOK\r\n",
            "\r\n#SS: 1,0\r\n\r\nOK\r\n",
            "\r\nOK\r\n",
            "\r\nOK\r\n",
            "\r\nOK\r\n",
            "\r\n#SS: 1,6\r\n\r\nOK\r\n",
            "\r\n#SS: 1,2,10.0.0.5,80,93.184.216.34,80\r\n\r\nOK\r\n",
        ]);

        let res = fx
            .sockets()
            .open_client(id(1), SocketProtocol::Tcp, "example.com", 80, 0, 0)
            .await;

        assert_eq!(res, Ok(()));
        assert_eq!(fx.table.status(id(1)).remote_port, 80);
        let commands = fx.commands();
        assert_eq!(commands[2], "AT#SCFGEXT=1,0,0,0\r");
        assert_eq!(commands[3], "AT#SCFGEXT3=1,1\r");
        assert_eq!(commands[4], "AT#SD=1,0,80,\"example.com\",0,80,1\r");
    }

    #[tokio::test]
    async fn dial_refused_is_code_24() {
        let mut fx = Fixture::new(&[
            "\r\n#GPRS: 1\r\n\r\nOK\r\n",
            "\r\n#SS: 1,0\r\n\r\nOK\r\n",
            "\r\nOK\r\n",
            "\r\nOK\r\n",
            "\r\n+CME ERROR: 558\r\n",
        ]);

        let err = fx
            .sockets()
            .open_client(id(1), SocketProtocol::Udp, "nowhere.invalid", 5000, 4000, 0)
            .await
            .unwrap_err();

        assert_eq!(err.code(), 24);
        assert_eq!(fx.dispatcher.last_error().value(), 558);
    }

    #[tokio::test]
    async fn open_server_tcp_listens() {
        let mut fx = Fixture::new(&[
            "\r\n#GPRS: 1\r\n\r\nOK\r\n",
            "\r\n#SS: 4,0\r\n\r\nOK\r\n",
            "\r\nOK\r\n",
            "\r\nOK\r\n",
        ]);

        let res = fx
            .sockets()
            .open_server(id(4), SocketProtocol::Tcp, 5000, 10)
            .await;

        assert_eq!(res, Ok(()));
        assert_eq!(fx.commands().last().unwrap(), "AT#SL=4,1,5000,255\r");
    }

    #[tokio::test]
    async fn send_streams_payload() {
        let mut fx = Fixture::new(&[
            "\r\n#SS: 1,2,10.0.0.5,80,1.2.3.4,80\r\n\r\nOK\r\n",
            "\r\n> ",
            "\r\nOK\r\n",
            "\r\n#SS: 1,2,10.0.0.5,80,1.2.3.4,80\r\n\r\nOK\r\n",
        ]);

        let res = fx.sockets().send(id(1), b"hello").await;

        assert_eq!(res, Ok(()));
        let flushes = fx.dispatcher.release().flushes();
        assert_eq!(flushes[1], "AT#SSENDEXT=1,5\r");
        assert_eq!(flushes[2], "hello");
    }

    #[tokio::test]
    async fn send_on_closed_socket_is_code_2() {
        let mut fx = Fixture::new(&["\r\n#SS: 1,0\r\n\r\nOK\r\n"]);

        let err = fx.sockets().send(id(1), b"hello").await.unwrap_err();

        assert_eq!(err.code(), 2);
    }

    #[tokio::test]
    async fn receive_reads_pending_bytes() {
        let mut fx = Fixture::new(&[
            "\r\n#SI: 1,0,0,0,0\r\n\r\nOK\r\n",
            "\r\n#SI: 1,0,12,12,0\r\n\r\nOK\r\n",
            "\r\n#SRECV: 1,12\r\nhello world!\r\n\r\nOK\r\n",
        ]);

        let data = fx
            .sockets()
            .receive(id(1), Duration::from_millis(200))
            .await
            .unwrap()
            .to_vec();

        assert_eq!(data, b"hello world!");
        assert_eq!(fx.commands().last().unwrap(), "AT#SRECV=1,12\r");
    }

    #[tokio::test]
    async fn receive_without_data_is_code_1() {
        let mut fx = Fixture::new(&["\r\n#SI: 1,0,0,0,0\r\n\r\nOK\r\n"]);

        let err = fx
            .sockets()
            .receive(id(1), Duration::from_millis(0))
            .await
            .unwrap_err();

        assert_eq!(err.code(), 1);
    }

    #[tokio::test]
    async fn receive_short_payload_is_bad_length() {
        let mut fx = Fixture::new(&[
            "\r\n#SI: 1,0,12,12,0\r\n\r\nOK\r\n",
            "\r\n#SRECV: 1,12\r\nhello",
        ]);

        let err = fx
            .sockets()
            .receive(id(1), Duration::from_millis(0))
            .await
            .unwrap_err();

        assert_eq!(err, ReceiveError::BadLength);
    }

    #[tokio::test]
    async fn status_all_fills_the_table() {
        let mut fx = Fixture::new(&[concat!(
            "\r\n#SS: 1,0\r\n#SS: 2,4,10.0.0.5,5000,0.0.0.0,0\r\n#SS: 3,0\r\n",
            "#SS: 4,0\r\n#SS: 5,5,10.0.0.5,5000,1.2.3.4,41000\r\n#SS: 6,0\r\n\r\nOK\r\n"
        )]);

        let mut sockets = fx.sockets();
        let table = sockets.status_all().await.unwrap();

        assert_eq!(table.status(id(2)).state, SocketState::Listening);
        assert_eq!(table.status(id(5)).state, SocketState::IncomingPending);
        assert_eq!(table.status(id(5)).remote_port, 41000);
    }

    #[tokio::test]
    async fn manage_sockets_accepts_pending_peers() {
        let mut fx = Fixture::new(&[
            "\r\n#SS: 1,0\r\n#SS: 2,4\r\n#SS: 3,0\r\n#SS: 4,0\r\n#SS: 5,0\r\n#SS: 6,0\r\n\r\nOK\r\n",
            "\r\n#SS: 1,0\r\n#SS: 2,5\r\n#SS: 3,0\r\n#SS: 4,0\r\n#SS: 5,0\r\n#SS: 6,0\r\n\r\nOK\r\n",
            "\r\nOK\r\n",
            "\r\n#SS: 1,0\r\n#SS: 2,2\r\n#SS: 3,0\r\n#SS: 4,0\r\n#SS: 5,0\r\n#SS: 6,0\r\n\r\nOK\r\n",
        ]);

        let accepted = fx
            .sockets()
            .manage_sockets(Duration::from_millis(200))
            .await
            .unwrap();

        assert_eq!(accepted.as_slice(), &[id(2)]);
        assert_eq!(fx.table.status(id(2)).state, SocketState::Suspended);
        assert!(fx.commands().contains(&"AT#SA=2,1\r".into()));
    }
}
