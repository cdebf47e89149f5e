use core::fmt::Write as _;

use defmt::{debug, info, warn};
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embassy_net::Stack;
use embassy_time::with_timeout;
use esp_hal::rng::Rng;
use reqwless::client::{HttpClient, TlsConfig, TlsVerify};
use reqwless::request::{Method as HttpMethod, RequestBuilder};
use static_cell::StaticCell;

use super::{notify, LedSender};
use crate::clock::SystemClock;
use crate::cloud::sync::CloudSync;
use crate::cloud::{CloudTransport, Method, Request, Response};
use crate::config::{CloudConfig, REQUEST_TIMEOUT};
use crate::error::TransportFault;
use crate::led::StatusEvent;
use crate::state::SharedState;

// RFC8449: TLS 1.3 encrypted records are limited to 16 KiB + 256 bytes.
const TLS_READ_BUFFER_SIZE: usize = 16640;
const TLS_WRITE_BUFFER_SIZE: usize = 4096;
const TCP_BUFFER_SIZE: usize = 1024;
/// Response head plus body.
const HTTP_BUFFER_SIZE: usize = 2048;

type Tcp = TcpClient<'static, 1, TCP_BUFFER_SIZE, TCP_BUFFER_SIZE>;

struct Buffers {
    tcp: TcpClientState<1, TCP_BUFFER_SIZE, TCP_BUFFER_SIZE>,
    tls_read: [u8; TLS_READ_BUFFER_SIZE],
    tls_write: [u8; TLS_WRITE_BUFFER_SIZE],
    http: [u8; HTTP_BUFFER_SIZE],
}

static BUFFERS: StaticCell<Buffers> = StaticCell::new();

/// HTTPS against the configured endpoint, one connection per request.
///
/// The server certificate is not verified.
pub struct HttpsTransport {
    stack: Stack<'static>,
    endpoint: &'static str,
    tcp: Tcp,
    tls_read: &'static mut [u8; TLS_READ_BUFFER_SIZE],
    tls_write: &'static mut [u8; TLS_WRITE_BUFFER_SIZE],
    http: &'static mut [u8; HTTP_BUFFER_SIZE],
    rng: Rng,
}

impl HttpsTransport {
    /// Can only be called once.
    pub fn new(stack: Stack<'static>, endpoint: &'static str, rng: Rng) -> Self {
        let buffers = BUFFERS.init(Buffers {
            tcp: TcpClientState::new(),
            tls_read: [0; TLS_READ_BUFFER_SIZE],
            tls_write: [0; TLS_WRITE_BUFFER_SIZE],
            http: [0; HTTP_BUFFER_SIZE],
        });
        let Buffers {
            tcp,
            tls_read,
            tls_write,
            http,
        } = buffers;
        Self {
            stack,
            endpoint,
            tcp: TcpClient::new(stack, tcp),
            tls_read,
            tls_write,
            http,
            rng,
        }
    }

    async fn exchange(
        &mut self,
        request: &Request<'_>,
        url: &str,
        response: &mut [u8],
    ) -> Result<Response, TransportFault> {
        let dns = DnsSocket::new(self.stack);
        let seed = (u64::from(self.rng.random()) << 32) | u64::from(self.rng.random());
        let tls = TlsConfig::new(
            seed,
            &mut self.tls_read[..],
            &mut self.tls_write[..],
            TlsVerify::None,
        );
        let mut client = HttpClient::new_with_tls(&self.tcp, &dns, tls);

        let method = match request.method {
            Method::Get => HttpMethod::GET,
            Method::Post => HttpMethod::POST,
        };
        let mut handle = client
            .request(method, url)
            .await
            .map_err(transport_fault)?
            .headers(request.headers)
            .body(request.body.unwrap_or(&[]));

        let reply = handle
            .send(&mut self.http[..])
            .await
            .map_err(transport_fault)?;
        let status = reply.status.0;
        let body = reply.body().read_to_end().await.map_err(transport_fault)?;

        let target = response
            .get_mut(..body.len())
            .ok_or(TransportFault::BufferTooSmall)?;
        target.copy_from_slice(body);
        debug!("{} {} -> {} ({} bytes)", url, status, body.len());
        Ok(Response {
            status,
            len: body.len(),
        })
    }
}

impl CloudTransport for HttpsTransport {
    async fn send(
        &mut self,
        request: &Request<'_>,
        response: &mut [u8],
    ) -> Result<Response, TransportFault> {
        let mut url = heapless::String::<256>::new();
        write!(url, "{}{}", self.endpoint, request.path)
            .map_err(|_| TransportFault::RequestTooLarge)?;

        with_timeout(REQUEST_TIMEOUT, self.exchange(request, &url, response))
            .await
            .unwrap_or(Err(TransportFault::Timeout))
    }
}

fn transport_fault(err: reqwless::Error) -> TransportFault {
    match err {
        reqwless::Error::Dns => TransportFault::Dns,
        reqwless::Error::Tls(_) => TransportFault::Tls,
        reqwless::Error::BufferTooSmall => TransportFault::BufferTooSmall,
        reqwless::Error::Network(_) => TransportFault::Connect,
        _ => TransportFault::Io,
    }
}

/// Pushes fresh readings to Tuya whenever the sync interval has elapsed.
#[embassy_executor::task]
pub async fn cloud_sync_task(
    stack: Stack<'static>,
    shared: &'static SharedState,
    clock: SystemClock,
    rng: Rng,
    led: LedSender,
) {
    let config = CloudConfig::from_env();
    let mut transport = HttpsTransport::new(stack, config.endpoint, rng);
    let mut cloud = CloudSync::new(config, shared);

    stack.wait_config_up().await;
    info!("Cloud sync running against {}", config.endpoint);

    loop {
        let reading = shared.wait_fresh().await;
        if !stack.is_config_up() {
            warn!("Network down, skipping cloud sync");
            continue;
        }
        if let Some(outcome) = cloud.maybe_sync(&mut transport, &clock, &reading).await {
            notify(&led, StatusEvent::from(outcome));
        }
    }
}
