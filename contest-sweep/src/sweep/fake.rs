//! In-memory chart used by the engine tests.

use anyhow::{Result, bail};
use std::sync::Mutex;

use super::ChartSurface;
use super::planner::{ChartArea, Probe};
use super::snapshot::{PanelSnapshot, RawSnapshot, TooltipSnapshot};

pub struct FakePoint {
    pub x: i32,
    pub snapshot: RawSnapshot,
}

impl FakePoint {
    pub fn panel(x: i32, date: &str, contest: &str, rating: i64) -> Self {
        Self::with_panel(
            x,
            PanelSnapshot {
                rating_text: Some(rating.to_string()),
                rating: Some(rating),
                date: Some(date.to_string()),
                contest_name: Some(contest.to_string()),
                rank_text: None,
                rank: None,
            },
        )
    }

    pub fn with_panel(x: i32, panel: PanelSnapshot) -> Self {
        Self {
            x,
            snapshot: RawSnapshot::Panel(panel),
        }
    }

    pub fn tooltip(x: i32, text: &str) -> Self {
        Self {
            x,
            snapshot: RawSnapshot::Tooltip(TooltipSnapshot {
                raw_text: text.to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct FakeState {
    active: Option<usize>,
    shown_panel: Option<PanelSnapshot>,
    pending_panel: Option<(PanelSnapshot, u32)>,
    hovered: Option<usize>,
    dispatches: usize,
}

/// Chart whose points react to hovering within `hit_radius` pixels of their X
/// (and inside the optional Y band). The info panel keeps showing the last
/// hovered panel point, like the real widget does.
pub struct FakeChart {
    tabs: Vec<(String, Vec<FakePoint>)>,
    area: Option<ChartArea>,
    hit_radius: i32,
    y_band: Option<(i32, i32)>,
    panel_lag: u32,
    broken: bool,
    state: Mutex<FakeState>,
}

impl FakeChart {
    pub fn new() -> Self {
        Self {
            tabs: Vec::new(),
            area: Some(ChartArea {
                left: 0.0,
                top: 0.0,
                width: 1000.0,
                height: 300.0,
            }),
            hit_radius: 3,
            y_band: None,
            panel_lag: 0,
            broken: false,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn with_tab(mut self, label: &str, points: Vec<FakePoint>) -> Self {
        self.tabs.push((label.to_string(), points));
        self
    }

    /// Make `points` the chart shown before any tab is clicked.
    pub fn showing(self, label: &str, points: Vec<FakePoint>) -> Self {
        let chart = self.with_tab(label, points);
        let index = chart.tabs.len() - 1;
        let first_panel = chart.first_panel(index);
        {
            let mut state = chart.lock();
            state.active = Some(index);
            state.shown_panel = first_panel;
        }
        chart
    }

    pub fn with_area(mut self, area: Option<ChartArea>) -> Self {
        self.area = area;
        self
    }

    pub fn with_y_band(mut self, low: i32, high: i32) -> Self {
        self.y_band = Some((low, high));
        self
    }

    pub fn with_panel_lag(mut self, reads: u32) -> Self {
        self.panel_lag = reads;
        self
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    pub fn active_tab(&self) -> Option<String> {
        let active = self.lock().active;
        active.map(|i| self.tabs[i].0.clone())
    }

    pub fn dispatch_count(&self) -> usize {
        self.lock().dispatches
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn check(&self) -> Result<()> {
        if self.broken {
            bail!("bridge connection lost");
        }
        Ok(())
    }

    fn first_panel(&self, tab: usize) -> Option<PanelSnapshot> {
        self.tabs[tab].1.iter().find_map(|p| match &p.snapshot {
            RawSnapshot::Panel(panel) => Some(panel.clone()),
            RawSnapshot::Tooltip(_) => None,
        })
    }

    fn active_points(&self, state: &FakeState) -> &[FakePoint] {
        state
            .active
            .map(|i| self.tabs[i].1.as_slice())
            .unwrap_or(&[])
    }
}

impl ChartSurface for FakeChart {
    async fn chart_area(&self) -> Result<Option<ChartArea>> {
        self.check()?;
        Ok(self.area)
    }

    async fn dispatch_pointer(&self, probe: Probe) -> Result<()> {
        self.check()?;
        let mut state = self.lock();
        state.dispatches += 1;

        let in_band = self
            .y_band
            .is_none_or(|(low, high)| probe.y >= low && probe.y <= high);
        let hovered = self
            .active_points(&state)
            .iter()
            .position(|p| in_band && (p.x - probe.x).abs() <= self.hit_radius);

        if let Some(index) = hovered {
            if let RawSnapshot::Panel(panel) = &self.active_points(&state)[index].snapshot {
                let panel = panel.clone();
                state.shown_panel = Some(panel);
                state.pending_panel = None;
            }
        }
        state.hovered = hovered;
        Ok(())
    }

    async fn read_snapshot(&self) -> Result<Option<RawSnapshot>> {
        self.check()?;
        let state = self.lock();
        if let Some(panel) = state.shown_panel.as_ref().filter(|p| p.is_hit()) {
            return Ok(Some(RawSnapshot::Panel(panel.clone())));
        }
        let tooltip = state
            .hovered
            .map(|i| &self.active_points(&state)[i].snapshot)
            .filter(|s| matches!(s, RawSnapshot::Tooltip(_)))
            .cloned();
        Ok(tooltip)
    }

    async fn read_panel(&self) -> Result<Option<PanelSnapshot>> {
        self.check()?;
        let mut state = self.lock();
        if let Some((panel, remaining)) = state.pending_panel.take() {
            if remaining == 0 {
                state.shown_panel = Some(panel);
            } else {
                state.pending_panel = Some((panel, remaining - 1));
            }
        }
        Ok(state.shown_panel.clone())
    }

    async fn activate_tab(&self, label: &str) -> Result<bool> {
        self.check()?;
        let wanted = label.to_lowercase();
        let Some(index) = self
            .tabs
            .iter()
            .position(|(l, _)| l.to_lowercase().contains(&wanted))
        else {
            return Ok(false);
        };

        let mut state = self.lock();
        state.active = Some(index);
        state.hovered = None;
        match self.first_panel(index) {
            Some(panel) if self.panel_lag == 0 => {
                state.shown_panel = Some(panel);
                state.pending_panel = None;
            }
            Some(panel) => state.pending_panel = Some((panel, self.panel_lag)),
            None => {
                state.shown_panel = None;
                state.pending_panel = None;
            }
        }
        Ok(true)
    }
}
