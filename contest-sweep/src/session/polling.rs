use super::CommandRunner;
use crate::sweep::scripts;
use crate::ws_server::{Command, Response};
use anyhow::{Result, bail};
use serde_json::Value;
use tokio::time::{Duration, Instant, sleep};

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const STABILITY_DELAY: Duration = Duration::from_millis(200);
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait until the extension reports the page ready twice in a row.
pub async fn wait_for_page_ready(runner: &CommandRunner, timeout: Duration) -> Result<()> {
    let start = Instant::now();

    while start.elapsed() < timeout {
        if page_ready(runner).await {
            sleep(STABILITY_DELAY).await;
            if page_ready(runner).await {
                return Ok(());
            }
        }
        sleep(POLL_INTERVAL).await;
    }

    bail!("Timeout waiting for page ready after {}ms", timeout.as_millis())
}

async fn page_ready(runner: &CommandRunner) -> bool {
    matches!(
        runner.send_command(Command::GetStatus, STATUS_TIMEOUT).await,
        Ok(Response::Status { page_ready: true, .. })
    )
}

/// Wait until `selector` matches an element on the page.
pub async fn wait_for_container(
    runner: &CommandRunner,
    selector: &str,
    timeout: Duration,
) -> Result<()> {
    let start = Instant::now();
    let script = scripts::container_present(selector);

    while start.elapsed() < timeout {
        match runner.evaluate(&script, STATUS_TIMEOUT).await {
            Ok(Value::Bool(true)) => return Ok(()),
            Ok(_) => {}
            Err(e) => log::debug!("Container probe failed: {}", e),
        }
        sleep(POLL_INTERVAL).await;
    }

    bail!(
        "Chart container '{}' did not appear within {}ms",
        selector,
        timeout.as_millis()
    )
}
