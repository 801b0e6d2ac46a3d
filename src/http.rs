//! HTTP client of the module, profile `0`.

use embassy_time::Duration;
use embedded_io_async::{Read, ReadReady, Write};
use heapless::String;

use crate::buffer::{tokens, truncated};
use crate::command::http::{HttpQuery, HttpReceive, HttpSend, SetHttpConfig};
use crate::config::Config;
use crate::connection::{Connection, ConnectionError, NetworkState};
use crate::dispatcher::{Dispatcher, ERROR, ERROR_CODE, RESULT_CODES};
use crate::error::Error;
use crate::module_timing::{payload_ack_timeout, payload_timeout, prompt_timeout};

const PROFILE: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HttpMethod {
    Get,
    Head,
    Delete,
    Post,
    Put,
}

impl HttpMethod {
    fn has_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }

    /// `<command>` of `#HTTPQRY` or `#HTTPSND`
    fn command(&self) -> u8 {
        match self {
            Self::Get | Self::Post => 0,
            Self::Head | Self::Put => 1,
            Self::Delete => 2,
        }
    }
}

/// A request to send through [`Http::request`].
#[derive(Debug, Clone, Copy)]
pub struct HttpRequest<'r> {
    pub method: HttpMethod,
    pub host: &'r str,
    pub port: u16,
    pub resource: &'r str,
    /// Sent for `POST` and `PUT` only
    pub body: &'r [u8],
}

impl<'r> HttpRequest<'r> {
    pub fn get(host: &'r str, port: u16, resource: &'r str) -> Self {
        Self {
            method: HttpMethod::Get,
            host,
            port,
            resource,
            body: &[],
        }
    }

    pub fn post(host: &'r str, port: u16, resource: &'r str, body: &'r [u8]) -> Self {
        Self {
            method: HttpMethod::Post,
            host,
            port,
            resource,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: String<32>,
    /// Body size announced by the server
    pub size: usize,
    /// Body bytes copied to the caller's buffer
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestError {
    /// `#HTTPCFG` was refused
    Config(Error),
    Request(Error),
    Body(Error),
}

impl RequestError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Config(_) => 1,
            Self::Request(_) => 2,
            Self::Body(_) => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResponseError {
    /// No `#HTTPRING` before the timeout
    Ring(Error),
    Header,
    Receive(Error),
    Body,
}

impl ResponseError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Ring(_) => 1,
            Self::Header => 2,
            Self::Receive(_) => 3,
            Self::Body => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HttpError {
    Connection(ConnectionError),
    Request(RequestError),
    Response(ResponseError),
}

impl HttpError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Connection(ConnectionError::IpAddress) => 15,
            Self::Connection(e) => e.code(),
            Self::Request(e) => e.code() + 15,
            Self::Response(e) => e.code() + 18,
        }
    }
}

impl From<ConnectionError> for HttpError {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

impl From<RequestError> for HttpError {
    fn from(e: RequestError) -> Self {
        Self::Request(e)
    }
}

impl From<ResponseError> for HttpError {
    fn from(e: ResponseError) -> Self {
        Self::Response(e)
    }
}

pub struct Http<'a, T, const N: usize> {
    dispatcher: &'a mut Dispatcher<T, N>,
    config: &'a Config,
    network: &'a mut NetworkState,
}

impl<'a, T, const N: usize> Http<'a, T, N>
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

    /// Make sure the data connection is up, send `request` and wait up to
    /// `timeout` for the answer. The body is copied to `out`.
    pub async fn http(
        &mut self,
        request: &HttpRequest<'_>,
        timeout: Duration,
        out: &mut [u8],
    ) -> Result<HttpResponse, HttpError> {
        let budget = self.config.timing.data_connection_budget;
        Connection::new(self.dispatcher, self.config, self.network)
            .check_data_connection(budget)
            .await?;
        self.request(request).await?;
        Ok(self.wait_response(timeout, out).await?)
    }

    pub async fn request(&mut self, request: &HttpRequest<'_>) -> Result<(), RequestError> {
        self.dispatcher
            .expect_ok(&SetHttpConfig {
                prof_id: PROFILE,
                server: request.host,
                port: request.port,
            })
            .await
            .map_err(RequestError::Config)?;

        debug!("[HTTP] {:?} {}", request.method, request.resource);
        if !request.method.has_body() {
            return self
                .dispatcher
                .expect_ok(&HttpQuery {
                    prof_id: PROFILE,
                    command: request.method.command(),
                    resource: request.resource,
                })
                .await
                .map_err(RequestError::Request);
        }

        let patterns = [">>>", ERROR_CODE, ERROR];
        let index = self
            .dispatcher
            .send_command(
                &HttpSend {
                    prof_id: PROFILE,
                    command: request.method.command(),
                    resource: request.resource,
                    data_len: request.body.len(),
                },
                &patterns,
            )
            .await
            .map_err(RequestError::Request)?;
        if index != 0 {
            return Err(RequestError::Request(
                self.dispatcher.failure(patterns[index]).await,
            ));
        }

        let index = self
            .dispatcher
            .send_raw(request.body, &RESULT_CODES, payload_ack_timeout())
            .await
            .map_err(RequestError::Body)?;
        self.dispatcher
            .result_code(RESULT_CODES[index])
            .await
            .map_err(RequestError::Body)
    }

    /// Wait for the `#HTTPRING` of the last request and read its body.
    pub async fn wait_response(
        &mut self,
        timeout: Duration,
        out: &mut [u8],
    ) -> Result<HttpResponse, ResponseError> {
        self.dispatcher
            .wait_for(&["#HTTPRING: 0,"], timeout)
            .await
            .map_err(ResponseError::Ring)?;
        self.dispatcher
            .wait_for(&["\r"], prompt_timeout())
            .await
            .map_err(|_| ResponseError::Header)?;

        let (status, content_type, size) = {
            let mut fields = tokens(self.dispatcher.response(), ",\r\n");
            let status: u16 = fields
                .next()
                .and_then(|s| s.trim().parse().ok())
                .ok_or(ResponseError::Header)?;
            let content_type: String<32> = fields
                .next()
                .map(|s| truncated(s.trim().trim_matches('"')))
                .ok_or(ResponseError::Header)?;
            let size: usize = fields
                .next()
                .and_then(|s| s.trim().parse().ok())
                .ok_or(ResponseError::Header)?;
            (status, content_type, size)
        };
        info!("[HTTP] status {}, {} bytes", status, size);

        let mut response = HttpResponse {
            status,
            content_type,
            size,
            len: 0,
        };
        if size == 0 {
            return Ok(response);
        }

        let patterns = ["<<<", ERROR_CODE, ERROR];
        let index = self
            .dispatcher
            .send_command_with_timeout(&HttpReceive { prof_id: PROFILE }, &patterns, prompt_timeout())
            .await
            .map_err(ResponseError::Receive)?;
        if index != 0 {
            return Err(ResponseError::Receive(
                self.dispatcher.failure(patterns[index]).await,
            ));
        }

        let len = size.min(out.len());
        while response.len < len {
            let chunk = (len - response.len).min(N);
            let body = self
                .dispatcher
                .read_raw(chunk, payload_timeout())
                .await
                .map_err(|_| ResponseError::Body)?;
            out[response.len..response.len + chunk].copy_from_slice(body);
            response.len += chunk;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{test_config, MockTransport};

    struct Fixture {
        dispatcher: Dispatcher<MockTransport, 1024>,
        config: Config,
        network: NetworkState,
    }

    impl Fixture {
        fn new(replies: &[&str]) -> Self {
            Self::with_transport(MockTransport::new(replies))
        }

        fn with_transport(mock: MockTransport) -> Self {
            Self {
                dispatcher: Dispatcher::new(mock),
                config: test_config(),
                network: NetworkState::default(),
            }
        }

        fn http(&mut self) -> Http<'_, MockTransport, 1024> {
            Http::new(&mut self.dispatcher, &self.config, &mut self.network)
        }
    }

    #[tokio::test]
    async fn get_reads_body() {
        let mut fx = Fixture::new(&[
            "\r\n#GPRS: 1\r\n\r\nOK\r\n",
            "\r\nOK\r\n",
            "\r\nOK\r\n\r\n#HTTPRING: 0,200,\"text/plain\",5\r\n",
            "\r\n<<<hello\r\nOK\r\n",
        ]);
        let mut out = [0u8; 64];

        let response = fx
            .http()
            .http(
                &HttpRequest::get("example.com", 80, "/index"),
                Duration::from_millis(200),
                &mut out,
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "text/plain");
        assert_eq!(response.size, 5);
        assert_eq!(&out[..response.len], b"hello");
        let commands = fx.dispatcher.release().commands();
        assert_eq!(commands[1], "AT#HTTPCFG=0,\"example.com\",80\r");
        assert_eq!(commands[2], "AT#HTTPQRY=0,0,\"/index\"\r");
        assert_eq!(commands[3], "AT#HTTPRCV=0\r");
    }

    #[tokio::test]
    async fn post_sends_body_after_prompt() {
        let mut fx = Fixture::new(&["\r\nOK\r\n", "\r\n>>>", "\r\nOK\r\n"]);
        let request = HttpRequest {
            method: HttpMethod::Put,
            ..HttpRequest::post("example.com", 8080, "/items", b"{\"a\":1}")
        };

        let res = fx.http().request(&request).await;

        assert_eq!(res, Ok(()));
        let flushes = fx.dispatcher.release().flushes();
        assert_eq!(flushes[1], "AT#HTTPSND=0,1,\"/items\",7\r");
        assert_eq!(flushes[2], "{\"a\":1}");
    }

    #[tokio::test]
    async fn body_is_cut_to_buffer() {
        let mut mock = MockTransport::new(&["\r\n<<<hello world\r\nOK\r\n"]);
        mock.push_unsolicited(b"\r\n#HTTPRING: 0,200,\"text/html\",11\r\n");
        let mut fx = Fixture::with_transport(mock);
        let mut out = [0u8; 5];

        let response = fx
            .http()
            .wait_response(Duration::from_millis(100), &mut out)
            .await
            .unwrap();

        assert_eq!(response.size, 11);
        assert_eq!(response.len, 5);
        assert_eq!(&out, b"hello");
    }

    #[tokio::test]
    async fn body_larger_than_response_buffer() {
        let body = [b'z'; 80];
        let reply = std::format!("\r\n<<<{}\r\nOK\r\n", std::str::from_utf8(&body).unwrap());
        let mut mock = MockTransport::new(&[reply.as_str()]);
        mock.push_unsolicited(b"\r\n#HTTPRING: 0,200,\"text/plain\",80\r\n");
        let mut dispatcher: Dispatcher<MockTransport, 32> = Dispatcher::new(mock);
        let config = test_config();
        let mut network = NetworkState::default();
        let mut out = [0u8; 128];

        let response = Http::new(&mut dispatcher, &config, &mut network)
            .wait_response(Duration::from_millis(100), &mut out)
            .await
            .unwrap();

        assert_eq!(response.len, 80);
        assert_eq!(&out[..80], &body[..]);
    }

    #[tokio::test]
    async fn missing_ring_is_code_19() {
        let mut fx = Fixture::new(&[]);
        let mut out = [0u8; 8];

        let err = fx
            .http()
            .wait_response(Duration::from_millis(20), &mut out)
            .await
            .unwrap_err();

        assert_eq!(HttpError::from(err).code(), 19);
    }
}
