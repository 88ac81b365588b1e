//! Contest history recovery from the hover-driven rating chart.
//!
//! The chart exposes its data only while the pointer rests on a point, so a
//! sweep plans a grid of probe coordinates, hovers each one, reads whatever
//! the info panel or tooltip shows, and reconciles the readings into an
//! ordered series.

pub mod browser;
pub mod dates;
pub mod planner;
pub mod probe;
pub mod reconcile;
pub mod scripts;
pub mod snapshot;
pub mod tabs;

#[cfg(test)]
mod fake;

use anyhow::Result;
use shared::{ContestHistory, PlatformTab, Series, SweepConfig, SweepMode};
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

pub use browser::BrowserChart;
pub use planner::{ChartArea, Probe, SweepPlan};
pub use probe::ProbeOptions;
pub use snapshot::{PanelSnapshot, RawSnapshot};

/// The live chart as seen by the engine.
///
/// Implementations talk to one page; every call observes or nudges shared
/// hover state, so callers must await each call before issuing the next.
#[allow(async_fn_in_trait)]
pub trait ChartSurface {
    /// Bounding box of the plotting surface, `None` when the chart is absent.
    async fn chart_area(&self) -> Result<Option<ChartArea>>;

    async fn dispatch_pointer(&self, probe: Probe) -> Result<()>;

    /// Current panel hit, else tooltip hit, else `None`.
    async fn read_snapshot(&self) -> Result<Option<RawSnapshot>>;

    /// Current info panel, hit or not.
    async fn read_panel(&self) -> Result<Option<PanelSnapshot>>;

    async fn activate_tab(&self, label: &str) -> Result<bool>;

    /// Run the whole probe loop at once. Surfaces that cannot batch fall back
    /// to stepping through the plan.
    async fn sweep_in_page(
        &self,
        plan: &SweepPlan,
        options: &ProbeOptions,
    ) -> Result<Vec<RawSnapshot>>
    where
        Self: Sized,
    {
        Ok(probe::run_stepwise(self, plan, options, &CancellationToken::new()).await)
    }
}

pub struct SweepEngine {
    config: SweepConfig,
    cancel: CancellationToken,
}

impl SweepEngine {
    pub fn new(config: SweepConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the sweep in progress; remaining platforms get empty series.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Sweep the chart as currently displayed.
    pub async fn sweep_chart<S: ChartSurface>(&self, surface: &S) -> Series {
        let area = match surface.chart_area().await {
            Ok(Some(area)) => area,
            Ok(None) => {
                log::info!("No chart surface found, nothing to sample");
                return Series::new();
            }
            Err(e) => {
                log::warn!("Failed to locate chart surface: {:#}", e);
                return Series::new();
            }
        };

        let plan = planner::plan(&area, &self.config.sweep);
        if plan.is_empty() {
            log::info!(
                "Chart area {}x{} is not sampleable",
                area.width,
                area.height
            );
            return Series::new();
        }

        let options = ProbeOptions::from_section(&self.config.sweep);
        log::info!(
            "Sweeping {} columns / {} probes ({:?} mode)",
            plan.columns.len(),
            plan.probe_count(),
            self.config.sweep.mode
        );

        let snapshots = match self.config.sweep.mode {
            SweepMode::InPage => {
                if self.cancel.is_cancelled() {
                    return Series::new();
                }
                match surface.sweep_in_page(&plan, &options).await {
                    Ok(snapshots) => snapshots,
                    Err(e) => {
                        log::warn!("In-page sweep failed: {:#}", e);
                        Vec::new()
                    }
                }
            }
            SweepMode::Stepwise => probe::run_stepwise(surface, &plan, &options, &self.cancel).await,
        };

        let series = reconcile::reconcile(snapshots.iter().filter_map(RawSnapshot::parse));
        log::info!("{} snapshots -> {} records", snapshots.len(), series.len());
        series
    }

    /// Activate `platform`'s tab, wait for the panel to follow, then sweep.
    pub async fn sweep_platform<S: ChartSurface>(&self, surface: &S, platform: &PlatformTab) -> Series {
        let previous = match surface.read_panel().await {
            Ok(panel) => panel,
            Err(e) => {
                log::debug!("Could not read panel before switching tabs: {}", e);
                None
            }
        };

        if !tabs::activate(surface, &platform.label).await {
            return Series::new();
        }

        let timeout = Duration::from_millis(self.config.chart.tab_timeout_ms);
        tabs::wait_for_panel_change(surface, previous.as_ref(), timeout).await;
        sleep(Duration::from_millis(self.config.chart.tab_settle_ms)).await;

        self.sweep_chart(surface).await
    }

    /// Sweep every configured platform, in order.
    pub async fn sweep_profile<S: ChartSurface>(&self, surface: &S) -> ContestHistory {
        self.sweep_platforms(surface, &self.config.platforms).await
    }

    pub async fn sweep_platforms<S: ChartSurface>(
        &self,
        surface: &S,
        platforms: &[PlatformTab],
    ) -> ContestHistory {
        let mut history = ContestHistory::new();
        for platform in platforms {
            let series = if self.cancel.is_cancelled() {
                Series::new()
            } else {
                log::info!("Platform {} ({})", platform.label, platform.key);
                self.sweep_platform(surface, platform).await
            };
            history.insert(platform.key.clone(), series);
        }
        history
    }
}
