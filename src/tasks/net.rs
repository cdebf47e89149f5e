use defmt::{info, warn};
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{Runner, Stack};
use embassy_time::{with_timeout, Duration, Instant, Timer};
use esp_wifi::wifi::{
    ClientConfiguration, Configuration, WifiController, WifiDevice, WifiEvent, WifiState,
};

use crate::clock::WallClock;
use crate::config::{
    NTP_SERVER, REQUEST_TIMEOUT, SNTP_RESYNC_INTERVAL, SNTP_RETRY_INTERVAL, WIFI_PASSWORD,
    WIFI_SSID,
};
use crate::sntp;

#[embassy_executor::task]
pub async fn wifi_task(mut controller: WifiController<'static>) {
    info!("Wi-Fi task starting (ssid=\"{}\")", WIFI_SSID);

    loop {
        if esp_wifi::wifi::wifi_state() == WifiState::StaConnected {
            // wait until we're no longer connected
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            warn!("Wi-Fi disconnected");
            Timer::after(Duration::from_secs(5)).await;
        }

        if !matches!(controller.is_started(), Ok(true)) {
            let client_config = Configuration::Client(ClientConfiguration {
                ssid: WIFI_SSID.into(),
                password: WIFI_PASSWORD.into(),
                ..Default::default()
            });
            if let Err(err) = controller.set_configuration(&client_config) {
                warn!("Wi-Fi set_configuration error: {:?}", err);
                Timer::after(Duration::from_secs(10)).await;
                continue;
            }
            info!("Starting Wi-Fi STA");
            if let Err(err) = controller.start_async().await {
                warn!("Wi-Fi start error: {:?}", err);
                Timer::after(Duration::from_secs(10)).await;
                continue;
            }
        }

        match controller.connect_async().await {
            Ok(()) => info!("Wi-Fi connected"),
            Err(err) => {
                warn!("Wi-Fi connect error: {:?}", err);
                Timer::after(Duration::from_secs(5)).await;
            }
        }
    }
}

#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

#[derive(Debug, defmt::Format)]
enum SntpError {
    Dns,
    Bind,
    Send,
    Timeout,
    Recv,
    BadReply,
}

/// Keeps the wall clock in step with `NTP_SERVER`.
#[embassy_executor::task]
pub async fn sntp_task(stack: Stack<'static>, wall: &'static WallClock) {
    let mut rx_meta = [PacketMetadata::EMPTY; 2];
    let mut tx_meta = [PacketMetadata::EMPTY; 2];
    let mut rx_buf = [0u8; 128];
    let mut tx_buf = [0u8; 128];

    loop {
        stack.wait_config_up().await;

        let mut socket = UdpSocket::new(
            stack,
            &mut rx_meta,
            &mut rx_buf,
            &mut tx_meta,
            &mut tx_buf,
        );
        let next = match query(stack, &mut socket).await {
            Ok((unix_ms, at)) => {
                wall.sync(unix_ms, at);
                info!("Wall clock set from {}: {} ms", NTP_SERVER, unix_ms);
                SNTP_RESYNC_INTERVAL
            }
            Err(err) => {
                warn!("SNTP query failed: {:?}", err);
                SNTP_RETRY_INTERVAL
            }
        };
        drop(socket);

        Timer::after(next).await;
    }
}

async fn query(
    stack: Stack<'static>,
    socket: &mut UdpSocket<'_>,
) -> Result<(u64, Instant), SntpError> {
    let addresses = stack
        .dns_query(NTP_SERVER, DnsQueryType::A)
        .await
        .map_err(|_| SntpError::Dns)?;
    let server = *addresses.first().ok_or(SntpError::Dns)?;

    socket.bind(0).map_err(|_| SntpError::Bind)?;
    socket
        .send_to(&sntp::request(), (server, sntp::NTP_PORT))
        .await
        .map_err(|_| SntpError::Send)?;

    let mut reply = [0u8; sntp::PACKET_LEN];
    let (len, _) = with_timeout(REQUEST_TIMEOUT, socket.recv_from(&mut reply))
        .await
        .map_err(|_| SntpError::Timeout)?
        .map_err(|_| SntpError::Recv)?;
    let at = Instant::now();

    let unix_ms = sntp::parse_response(&reply[..len]).ok_or(SntpError::BadReply)?;
    Ok((unix_ms, at))
}
