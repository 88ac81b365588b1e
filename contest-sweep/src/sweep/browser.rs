use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::ChartSection;
use tokio::time::Duration;

use super::planner::{ChartArea, Probe, SweepPlan};
use super::probe::ProbeOptions;
use super::snapshot::{PanelSnapshot, RawSnapshot};
use super::{ChartSurface, scripts};
use crate::session::CommandRunner;
use crate::ws_server::{Command, Response};

/// The rating chart of the page the bridge's extension is attached to.
pub struct BrowserChart<'a> {
    runner: &'a CommandRunner,
    chart: &'a ChartSection,
    command_timeout: Duration,
}

impl<'a> BrowserChart<'a> {
    pub fn new(runner: &'a CommandRunner, chart: &'a ChartSection, command_timeout: Duration) -> Self {
        Self {
            runner,
            chart,
            command_timeout,
        }
    }

    async fn eval(&self, script: &str) -> Result<Value> {
        self.runner.evaluate(script, self.command_timeout).await
    }

    async fn eval_as<T: DeserializeOwned>(&self, script: &str) -> Result<Option<T>> {
        let value = self.eval(script).await?;
        if value.is_null() {
            return Ok(None);
        }
        let parsed = serde_json::from_value(value).context("Unexpected page script result")?;
        Ok(Some(parsed))
    }
}

impl ChartSurface for BrowserChart<'_> {
    async fn chart_area(&self) -> Result<Option<ChartArea>> {
        let script = scripts::chart_area(&self.chart.container_selector, &self.chart.svg_selector);
        self.eval_as(&script).await
    }

    async fn dispatch_pointer(&self, probe: Probe) -> Result<()> {
        let script = scripts::dispatch_pointer(probe, &self.chart.container_selector);
        self.eval(&script).await?;
        Ok(())
    }

    async fn read_snapshot(&self) -> Result<Option<RawSnapshot>> {
        self.eval_as(&scripts::read_snapshot(&self.chart.container_selector))
            .await
    }

    async fn read_panel(&self) -> Result<Option<PanelSnapshot>> {
        let Some(RawSnapshot::Panel(panel)) = self
            .eval_as(&scripts::read_panel(&self.chart.container_selector))
            .await?
        else {
            return Ok(None);
        };
        Ok(Some(panel))
    }

    /// Text-locator click through the extension first, then a scan of the DOM
    /// for a clickable element containing the label.
    async fn activate_tab(&self, label: &str) -> Result<bool> {
        let command = Command::ClickText {
            text: label.to_string(),
            exact: false,
        };
        match self.runner.send_command(command, self.command_timeout).await {
            Ok(Response::Success { .. }) => return Ok(true),
            Ok(Response::Error { message }) => log::debug!("Locator click on '{}' failed: {}", label, message),
            Ok(other) => log::debug!("Unexpected click response: {:?}", other),
            Err(e) => return Err(e),
        }

        let clicked = self.eval(&scripts::click_by_text(label)).await?;
        Ok(clicked.as_bool().unwrap_or(false))
    }

    async fn sweep_in_page(&self, plan: &SweepPlan, options: &ProbeOptions) -> Result<Vec<RawSnapshot>> {
        let script = scripts::sweep(
            plan,
            &self.chart.container_selector,
            options.settle.as_millis() as u64,
            options.hit_policy,
        );
        let timeout = self.command_timeout.saturating_add(options.estimated_duration(plan));
        log::debug!("In-page sweep, timeout {}ms", timeout.as_millis());

        let value = self.runner.evaluate(&script, timeout).await?;
        Ok(parse_snapshot_list(value))
    }
}

/// Keep every well-formed snapshot; anything else in the list is skipped.
fn parse_snapshot_list(value: Value) -> Vec<RawSnapshot> {
    let Value::Array(items) = value else {
        log::warn!("In-page sweep returned a non-list result");
        return Vec::new();
    };

    let total = items.len();
    let snapshots: Vec<RawSnapshot> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if snapshots.len() < total {
        log::debug!("Skipped {} malformed snapshots", total - snapshots.len());
    }
    snapshots
}
