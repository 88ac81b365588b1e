use shared::{HitPolicy, SweepSection};
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

use super::ChartSurface;
use super::planner::{Probe, SweepPlan};
use super::snapshot::RawSnapshot;

/// Per-sweep probing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    pub settle: Duration,
    pub hit_policy: HitPolicy,
}

impl ProbeOptions {
    pub fn from_section(sweep: &SweepSection) -> Self {
        Self {
            settle: Duration::from_millis(sweep.probe_delay_ms),
            hit_policy: sweep.hit_policy,
        }
    }

    /// Upper bound for one in-page sweep over `plan`, ignoring bridge overhead.
    pub fn estimated_duration(&self, plan: &SweepPlan) -> Duration {
        // setTimeout clamps nested timers to roughly 4ms
        let per_probe = self
            .settle
            .max(Duration::from_millis(4))
            .saturating_add(Duration::from_millis(1));
        u32::try_from(plan.probe_count())
            .ok()
            .and_then(|count| per_probe.checked_mul(count))
            .unwrap_or(Duration::MAX)
    }
}

/// Drive the sweep from Rust, one bridge round trip per step.
///
/// Probes run strictly in order; each one waits `settle` before reading so
/// the chart's hover handler has caught up. Dispatch and read failures only
/// cost the probe they happen on. Cancellation stops between probes and
/// keeps what was collected.
pub async fn run_stepwise<S: ChartSurface>(
    surface: &S,
    plan: &SweepPlan,
    options: &ProbeOptions,
    cancel: &CancellationToken,
) -> Vec<RawSnapshot> {
    let mut snapshots = Vec::new();

    'columns: for column in &plan.columns {
        for &y in &column.ys {
            if cancel.is_cancelled() {
                log::info!("Sweep cancelled after {} snapshots", snapshots.len());
                break 'columns;
            }

            let probe = Probe { x: column.x, y };
            if let Err(e) = surface.dispatch_pointer(probe).await {
                log::debug!("Dispatch at ({}, {}) failed: {}", probe.x, probe.y, e);
            }
            sleep(options.settle).await;

            match surface.read_snapshot().await {
                Ok(Some(snapshot)) if snapshot.is_hit() => {
                    log::debug!("Hit at ({}, {})", probe.x, probe.y);
                    snapshots.push(snapshot);
                    if options.hit_policy == HitPolicy::FirstPerColumn {
                        continue 'columns;
                    }
                }
                Ok(_) => {}
                Err(e) => log::debug!("Read at ({}, {}) failed: {}", probe.x, probe.y, e),
            }
        }
    }

    snapshots
}
