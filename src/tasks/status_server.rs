use defmt::{debug, info, warn};
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_time::{Duration, Timer};
use embedded_io_async::Write as _;

use crate::config::{STATUS_PORT, TUYA_DEVICE_ID};
use crate::state::SharedState;
use crate::status;

// Keep one worker in accept() while the other is answering.
pub const STATUS_WORKER_COUNT: usize = 2;

const MAX_REQUEST_SIZE: usize = 1024;

#[embassy_executor::task(pool_size = STATUS_WORKER_COUNT)]
pub async fn status_worker(stack: Stack<'static>, shared: &'static SharedState, worker_id: usize) {
    let mut rx_buf = [0u8; 1024];
    let mut tx_buf = [0u8; 1024];

    info!("Status worker {} starting (port={})", worker_id, STATUS_PORT);

    loop {
        // Ensure network is configured before accepting connections.
        stack.wait_config_up().await;

        let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);
        socket.set_timeout(Some(Duration::from_secs(10)));

        match socket.accept(STATUS_PORT).await {
            Ok(()) => {
                if let Err(err) = handle_connection(&mut socket, shared).await {
                    warn!("Status worker {} connection error: {:?}", worker_id, err);
                }
            }
            Err(err) => {
                warn!("Status worker {} accept error: {:?}", worker_id, err);
                Timer::after(Duration::from_millis(200)).await;
            }
        }

        socket.close();
        let _ = socket.flush().await;
    }
}

async fn handle_connection(
    socket: &mut TcpSocket<'_>,
    shared: &SharedState,
) -> Result<(), embassy_net::tcp::Error> {
    let mut buf = [0u8; MAX_REQUEST_SIZE];
    let mut total = 0usize;

    // Read until we see the end of headers or the buffer is full.
    loop {
        let n = socket.read(&mut buf[total..]).await?;
        if n == 0 {
            if total == 0 {
                return Ok(());
            }
            break;
        }
        total += n;
        if total >= MAX_REQUEST_SIZE || buf[..total].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let route = status::route(&buf[..total]);
    let page = status::respond(route, &shared.snapshot(), TUYA_DEVICE_ID);
    debug!("Status request {:?} -> {}", route, page.status);

    socket.write_all(status::write_head(&page).as_bytes()).await?;
    socket.write_all(page.body.as_bytes()).await?;
    socket.flush().await
}
