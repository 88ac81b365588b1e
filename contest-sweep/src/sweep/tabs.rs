use tokio::time::{Duration, Instant, sleep};

use super::ChartSurface;
use super::snapshot::PanelSnapshot;

const PANEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Switch the chart to the platform tab labelled `label`.
///
/// Returns `false` when no matching control exists or the interaction failed;
/// the caller records an empty series for that platform.
pub async fn activate<S: ChartSurface>(surface: &S, label: &str) -> bool {
    match surface.activate_tab(label).await {
        Ok(true) => {
            log::info!("Activated tab '{}'", label);
            true
        }
        Ok(false) => {
            log::warn!("No tab matching '{}' found", label);
            false
        }
        Err(e) => {
            log::warn!("Activating tab '{}' failed: {}", label, e);
            false
        }
    }
}

/// Poll the info panel until its date/contest pair moves away from
/// `previous`, or until anything shows up when there was no previous panel.
///
/// A timeout is not an error: the sweep carries on with whatever the chart
/// currently shows.
pub async fn wait_for_panel_change<S: ChartSurface>(
    surface: &S,
    previous: Option<&PanelSnapshot>,
    timeout: Duration,
) -> bool {
    let start = Instant::now();
    let previous = previous.filter(|p| p.has_date_or_contest());

    loop {
        match surface.read_panel().await {
            Ok(Some(current)) => {
                let changed = match previous {
                    Some(previous) => current.differs_from(previous),
                    None => current.has_date_or_contest(),
                };
                if changed {
                    return true;
                }
            }
            Ok(None) => {}
            Err(e) => log::debug!("Panel read failed while waiting: {}", e),
        }

        if start.elapsed() >= timeout {
            log::warn!(
                "Panel did not change within {}ms, sweeping current state",
                timeout.as_millis()
            );
            return false;
        }
        sleep(PANEL_POLL_INTERVAL).await;
    }
}
