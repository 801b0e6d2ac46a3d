//! Short messages in text mode, stored on the SIM.

use embassy_time::{Duration, Instant, Timer};
use embedded_io_async::{Read, ReadReady, Write};
use heapless::String;

use crate::buffer::{tokens, truncated};
use crate::command::sms::{
    DeleteMessage, ListMessages, ReadMessage, SendMessage, SetMessageFormat,
    SetNewMessageIndication, SetSimMessageStorage,
};
use crate::config::Config;
use crate::connection::{Connection, ConnectionError, NetworkState};
use crate::dispatcher::{Dispatcher, CRLF, CTRL_Z, ERROR, ERROR_CODE, ESC, OK, RESULT_CODES};
use crate::error::Error;
use crate::module_timing::{prompt_timeout, sms_send_timeout};

const BODY_END: &str = "\r\n\r\nOK";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SmsMessage {
    /// Storage index on the SIM
    pub index: u16,
    /// `REC UNREAD`, `REC READ`, ...
    pub status: String<16>,
    pub number: String<20>,
    /// `yy/MM/dd`
    pub date: String<8>,
    /// `hh:mm:ss±zz`
    pub time: String<12>,
    pub body: String<160>,
}

impl SmsMessage {
    /// Fill the header fields from `"<stat>","<number>","<alpha>","<date>,<time>"`.
    fn parse_header<'s>(&mut self, mut fields: impl Iterator<Item = &'s str>) {
        self.status = truncated(fields.next().unwrap_or(""));
        self.number = truncated(fields.next().unwrap_or(""));
        self.date = truncated(fields.next().unwrap_or(""));
        self.time = truncated(fields.next().unwrap_or(""));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SmsError {
    /// `+CMGF` was refused
    Format(Error),
    Storage(Error),
    Indication(Error),
    Connection(ConnectionError),
    /// No `>` prompt for the destination number
    Number(Error),
    Body(Error),
    Read(Error),
    /// No unread message before the timeout
    NoMessage,
    Delete(Error),
}

impl SmsError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Format(_) | Self::Read(_) | Self::NoMessage | Self::Delete(_) => 1,
            Self::Storage(_) => 2,
            Self::Indication(_) => 3,
            Self::Connection(e) => e.code(),
            Self::Number(_) => 5,
            Self::Body(_) => 6,
        }
    }
}

impl From<ConnectionError> for SmsError {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

pub struct Sms<'a, T, const N: usize> {
    dispatcher: &'a mut Dispatcher<T, N>,
    config: &'a Config,
    network: &'a mut NetworkState,
}

impl<'a, T, const N: usize> Sms<'a, T, N>
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

    /// Text mode, SIM storage and `+CMTI` indications.
    pub async fn configure(&mut self) -> Result<(), SmsError> {
        self.dispatcher
            .expect_ok(&SetMessageFormat { mode: 1 })
            .await
            .map_err(SmsError::Format)?;
        self.dispatcher
            .expect_ok(&SetSimMessageStorage)
            .await
            .map_err(SmsError::Storage)?;
        self.dispatcher
            .expect_ok(&SetNewMessageIndication {
                mode: 2,
                mt: 1,
                bm: 0,
                ds: 0,
                bfr: 0,
            })
            .await
            .map_err(SmsError::Indication)
    }

    pub async fn send(&mut self, number: &str, text: &str) -> Result<(), SmsError> {
        let budget = self.config.timing.data_connection_budget;
        Connection::new(self.dispatcher, self.config, self.network)
            .check_connection(budget)
            .await?;

        debug!("[SMS] sending {} bytes to {}", text.len(), number);
        let patterns = [">", ERROR_CODE, ERROR];
        let prompt = match self
            .dispatcher
            .send_command(&SendMessage { number }, &patterns)
            .await
        {
            Ok(0) => Ok(()),
            Ok(index) => Err(self.dispatcher.failure(patterns[index]).await),
            Err(e) => Err(e),
        };
        if let Err(e) = prompt {
            self.abort().await;
            return Err(SmsError::Number(e));
        }

        let res = match self
            .dispatcher
            .send_terminated(text.as_bytes(), CTRL_Z, &RESULT_CODES, sms_send_timeout())
            .await
        {
            Ok(index) => self.dispatcher.result_code(RESULT_CODES[index]).await,
            Err(e) => Err(e),
        };
        if let Err(e) = res {
            self.abort().await;
            return Err(SmsError::Body(e));
        }
        Ok(())
    }

    /// Read the message stored at `index`.
    pub async fn read(&mut self, index: u16) -> Result<SmsMessage, SmsError> {
        let patterns = ["+CMGR: ", ERROR_CODE, ERROR, OK];
        match self
            .dispatcher
            .send_command(&ReadMessage { index }, &patterns)
            .await
            .map_err(SmsError::Read)?
        {
            0 => {}
            // an empty slot answers a bare OK
            3 => return Err(SmsError::Read(Error::Unexpected)),
            i => return Err(SmsError::Read(self.dispatcher.failure(patterns[i]).await)),
        }

        self.dispatcher
            .wait_for(&[CRLF], prompt_timeout())
            .await
            .map_err(SmsError::Read)?;
        let mut message = SmsMessage {
            index,
            ..SmsMessage::default()
        };
        message.parse_header(tokens(self.dispatcher.response(), "\",\r\n"));

        self.dispatcher
            .wait_for(&[BODY_END], prompt_timeout())
            .await
            .map_err(SmsError::Read)?;
        let body = self.dispatcher.response();
        message.body = truncated(body.strip_suffix(BODY_END).unwrap_or(body));
        Ok(message)
    }

    /// Poll for the first unread message until `timeout` and read it. A zero
    /// timeout checks once.
    pub async fn read_unread(&mut self, timeout: Duration) -> Result<SmsMessage, SmsError> {
        let start = Instant::now();
        let patterns = ["+CMGL: ", ERROR_CODE, ERROR, OK];
        loop {
            let cmd = ListMessages {
                stat: "REC UNREAD",
            };
            match self
                .dispatcher
                .send_command(&cmd, &patterns)
                .await
                .map_err(SmsError::Read)?
            {
                0 => break,
                3 => {}
                i => return Err(SmsError::Read(self.dispatcher.failure(patterns[i]).await)),
            }
            if start.elapsed() >= timeout {
                return Err(SmsError::NoMessage);
            }
            Timer::after(self.config.timing.retry_pause).await;
        }

        self.dispatcher
            .wait_for(&[","], prompt_timeout())
            .await
            .map_err(SmsError::Read)?;
        let index = tokens(self.dispatcher.response(), ", ")
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or(SmsError::Read(Error::Parse))?;
        info!("[SMS] unread message at {}", index);
        self.read(index).await
    }

    /// Delete messages, `flag` as in `+CMGD`: `0` only `index`, `4` all.
    pub async fn delete(&mut self, index: u16, flag: u8) -> Result<(), SmsError> {
        self.dispatcher
            .expect_ok(&DeleteMessage { index, flag })
            .await
            .map_err(SmsError::Delete)
    }

    /// Leave a pending `>` prompt.
    async fn abort(&mut self) {
        if self.dispatcher.write_raw(&[ESC]).await.is_err() {
            warn!("[SMS] could not abort the prompt");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{test_config, MockTransport};

    struct Fixture {
        dispatcher: Dispatcher<MockTransport, 512>,
        config: Config,
        network: NetworkState,
    }

    impl Fixture {
        fn new(replies: &[&str]) -> Self {
            Self {
                dispatcher: Dispatcher::new(MockTransport::new(replies)),
                config: test_config(),
                network: NetworkState::default(),
            }
        }

        fn sms(&mut self) -> Sms<'_, MockTransport, 512> {
            Sms::new(&mut self.dispatcher, &self.config, &mut self.network)
        }
    }

    #[tokio::test]
    async fn configure_sends_three_commands() {
        let mut fx = Fixture::new(&[
            "\r\nOK\r\n",
            "\r\n+CPMS: 1,30,1,30,1,30\r\n\r\nOK\r\n",
            "\r\nOK\r\n",
        ]);

        let res = fx.sms().configure().await;

        assert_eq!(res, Ok(()));
        assert_eq!(
            fx.dispatcher.release().commands(),
            [
                "AT+CMGF=1\r",
                "AT+CPMS=\"SM\",\"SM\",\"SM\"\r",
                "AT+CNMI=2,1,0,0,0\r"
            ]
        );
    }

    #[tokio::test]
    async fn send_terminates_text() {
        let mut fx = Fixture::new(&[
            "\r\n+CREG: 0,1\r\n\r\nOK\r\n",
            "\r\n> ",
            "\r\n+CMGS: 12\r\n\r\nOK\r\n",
        ]);

        let res = fx.sms().send("+34666666666", "hello").await;

        assert_eq!(res, Ok(()));
        let flushes = fx.dispatcher.release().flushes();
        assert_eq!(flushes[1], "AT+CMGS=\"+34666666666\"\r");
        assert_eq!(flushes[2], "hello\u{1a}");
    }

    #[tokio::test]
    async fn missing_prompt_aborts_with_code_5() {
        let mut fx = Fixture::new(&["\r\n+CREG: 0,5\r\n\r\nOK\r\n", "\r\n+CMS ERROR: 304\r\n"]);

        let err = fx.sms().send("+34666666666", "hello").await.unwrap_err();

        assert_eq!(err.code(), 5);
        let flushes = fx.dispatcher.release().flushes();
        assert_eq!(flushes.last().unwrap(), "\u{1b}");
    }

    #[tokio::test]
    async fn reads_message_by_index() {
        let mut fx = Fixture::new(&[concat!(
            "\r\n+CMGR: \"REC READ\",\"+34666666666\",\"\",\"16/06/20,10:12:34+08\"\r\n",
            "See you at noon\r\n\r\nOK\r\n"
        )]);

        let message = fx.sms().read(3).await.unwrap();

        assert_eq!(message.index, 3);
        assert_eq!(message.status, "REC READ");
        assert_eq!(message.number, "+34666666666");
        assert_eq!(message.date, "16/06/20");
        assert_eq!(message.time, "10:12:34+08");
        assert_eq!(message.body, "See you at noon");
    }

    #[tokio::test]
    async fn polls_for_unread_message() {
        let mut fx = Fixture::new(&[
            "\r\nOK\r\n",
            concat!(
                "\r\n+CMGL: 19,\"REC UNREAD\",\"+345901000118833\",\"\",\"16/06/20,12:20:20+08\"\r\n",
                "ping\r\n\r\nOK\r\n"
            ),
            concat!(
                "\r\n+CMGR: \"REC UNREAD\",\"+345901000118833\",\"\",\"16/06/20,12:20:20+08\"\r\n",
                "ping\r\n\r\nOK\r\n"
            ),
        ]);

        let message = fx
            .sms()
            .read_unread(Duration::from_millis(200))
            .await
            .unwrap();

        assert_eq!(message.index, 19);
        assert_eq!(message.body, "ping");
        assert_eq!(
            fx.dispatcher.release().commands().last().unwrap(),
            "AT+CMGR=19\r"
        );
    }

    #[tokio::test]
    async fn no_unread_message() {
        let mut fx = Fixture::new(&["\r\nOK\r\n"]);

        let err = fx
            .sms()
            .read_unread(Duration::from_millis(0))
            .await
            .unwrap_err();

        assert_eq!(err, SmsError::NoMessage);
    }
}
