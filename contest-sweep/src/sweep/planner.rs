use serde::{Deserialize, Serialize};
use shared::SweepSection;

/// Bounding box of the chart's plotting surface, in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartArea {
    #[serde(alias = "x")]
    pub left: f64,
    #[serde(alias = "y")]
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ChartArea {
    pub fn is_degenerate(&self) -> bool {
        let finite = [self.left, self.top, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        !finite || self.width <= 0.0 || self.height <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub x: i32,
    pub y: i32,
}

/// One X position with its vertical fan of Y candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeColumn {
    pub x: i32,
    pub ys: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepPlan {
    pub columns: Vec<ProbeColumn>,
}

impl SweepPlan {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn probe_count(&self) -> usize {
        self.columns.iter().map(|c| c.ys.len()).sum()
    }

    /// All probes in sweep order: left to right, then down each fan.
    pub fn probes(&self) -> impl Iterator<Item = Probe> + '_ {
        self.columns
            .iter()
            .flat_map(|c| c.ys.iter().map(move |&y| Probe { x: c.x, y }))
    }
}

/// Lay out the probe grid over `area`.
///
/// X positions are evenly spaced inside a small horizontal padding that keeps
/// probes off the chart border; each X gets the same Y fan centred on the
/// vertical middle of the area. An area too narrow for its padding gets a
/// single column at its horizontal middle.
pub fn plan(area: &ChartArea, sweep: &SweepSection) -> SweepPlan {
    if area.is_degenerate() || sweep.x_steps == 0 {
        return SweepPlan::default();
    }

    let pad_x = (area.width * 0.02).max(4.0);
    let start_x = area.left + pad_x;
    let end_x = area.left + area.width - pad_x;

    let ys = fan(area, sweep);

    let steps = if end_x > start_x { sweep.x_steps } else { 1 };
    let columns = (0..steps)
        .map(|i| {
            let t = if steps > 1 {
                f64::from(i) / f64::from(steps - 1)
            } else {
                0.5
            };
            ProbeColumn {
                x: (start_x + (end_x - start_x) * t).round() as i32,
                ys: ys.clone(),
            }
        })
        .collect();

    SweepPlan { columns }
}

fn fan(area: &ChartArea, sweep: &SweepSection) -> Vec<i32> {
    let center_y = (area.top + area.height * 0.5).floor() as i64;
    let half = i64::from(sweep.y_sweep_pixels / 2);
    let step = sweep.y_sweep_step.max(1) as usize;

    (-half..=half)
        .step_by(step)
        .filter_map(|offset| i32::try_from(center_y + offset).ok())
        .collect()
}
