// Wait-until-ready polling for network services

use crate::error::{Result, ServiceError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll `address` until a TCP connection succeeds or `timeout` elapses.
///
/// ```no_run
/// use std::time::Duration;
/// use testbed_containers::wait_for_port;
///
/// # tokio_test::block_on(async {
/// wait_for_port("127.0.0.1:8000", Duration::from_secs(30)).await?;
/// # Ok::<(), testbed_containers::ServiceError>(())
/// # });
/// ```
pub async fn wait_for_port(address: &str, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        match TcpStream::connect(address).await {
            Ok(_) => {
                debug!(address, "Service port is reachable");
                return Ok(());
            }
            Err(e) => trace!(address, error = %e, "Service port not reachable yet"),
        }

        if Instant::now() + POLL_INTERVAL > deadline {
            return Err(ServiceError::ReadinessTimeout {
                address: address.to_string(),
                timeout,
            });
        }
        sleep(POLL_INTERVAL).await;
    }
}
