//! Page-side routines, evaluated through the bridge's `EvaluateJs` command.
//!
//! Every script is a self-contained expression: the helper object below is
//! defined inline and one of its methods is invoked with JSON-encoded
//! arguments. The sweep method returns a promise; the extension awaits it.

use serde_json::{Value, json};
use shared::HitPolicy;

use super::planner::{Probe, SweepPlan};

const PRELUDE: &str = r#"
const __sweep = {
  text(el) {
    return el && typeof el.innerText === 'string' ? el.innerText.trim() : '';
  },
  digits(s) {
    const d = (s || '').replace(/[^0-9]/g, '');
    if (!d) return null;
    const n = parseInt(d, 10);
    return Number.isSafeInteger(n) ? n : null;
  },
  readPanel(sel) {
    const root = document.querySelector(sel);
    if (!root) return null;
    const header = root.querySelector('.flex.gap-10') || root.querySelector('div.flex.flex-col');
    if (!header) return null;
    const ratingDiv = header.querySelector('div.flex.flex-col') || header.children[0];
    const infoDiv = header.querySelector('div.w-full') || header.children[1];
    if (!ratingDiv || !infoDiv) return null;
    const ratingSpan = ratingDiv.querySelector('span:nth-child(2)') || ratingDiv.querySelector('span');
    const ps = infoDiv.querySelectorAll('p');
    const ratingText = this.text(ratingSpan);
    const rankText = this.text(ps[2]);
    return {
      kind: 'panel',
      ratingText: ratingText || null,
      rating: this.digits(ratingText),
      date: this.text(ps[0]) || null,
      contestName: this.text(ps[1]) || null,
      rankText: rankText || null,
      rank: this.digits(rankText),
    };
  },
  readTooltip() {
    const rawText = ['.apexcharts-xaxistooltip-text', '.apexcharts-tooltip']
      .map((s) => this.text(document.querySelector(s)))
      .join('\n')
      .trim();
    return rawText.length > 1 ? { kind: 'tooltip', rawText } : null;
  },
  readSnapshot(sel) {
    const panel = this.readPanel(sel);
    if (panel && panel.contestName) return panel;
    return this.readTooltip();
  },
  dispatch(x, y, sel) {
    const init = { bubbles: true, cancelable: true, clientX: x, clientY: y };
    const events = () => [
      new PointerEvent('pointermove', Object.assign({ pointerType: 'mouse' }, init)),
      new MouseEvent('mousemove', init),
    ];
    try {
      const el = document.elementFromPoint(x, y);
      if (el) events().forEach((e) => el.dispatchEvent(e));
    } catch (e) {}
    try {
      const container = document.querySelector(sel);
      if (container) events().forEach((e) => container.dispatchEvent(e));
    } catch (e) {}
    return true;
  },
  chartArea(sel, svgSel) {
    const root = document.querySelector(sel);
    if (!root) return null;
    const svg = root.querySelector(svgSel) || root.querySelector('svg');
    if (!svg) return null;
    const r = svg.getBoundingClientRect();
    return { left: r.left, top: r.top, width: r.width, height: r.height };
  },
  containerPresent(sel) {
    return document.querySelector(sel) !== null;
  },
  clickByText(label) {
    const wanted = label.toLowerCase();
    const clickable = (el) => {
      for (let cur = el; cur; cur = cur.parentElement) {
        if (typeof cur.click === 'function' &&
            (cur.offsetParent !== null || cur.getAttribute('role') === 'button')) {
          return cur;
        }
      }
      return null;
    };
    for (const node of Array.from(document.querySelectorAll('*'))) {
      try {
        if (!node.innerText) continue;
        if (!node.innerText.trim().toLowerCase().includes(wanted)) continue;
        const target = clickable(node);
        if (target) { target.click(); return true; }
        if (typeof node.click === 'function') { node.click(); return true; }
      } catch (e) {}
    }
    return false;
  },
  async sweep(plan, sel, delayMs, allHits) {
    const pause = () => new Promise((resolve) => setTimeout(resolve, delayMs));
    const out = [];
    for (const column of plan.columns) {
      for (const y of column.ys) {
        this.dispatch(column.x, y, sel);
        await pause();
        const snapshot = this.readSnapshot(sel);
        if (snapshot) {
          out.push(snapshot);
          if (!allHits) break;
        }
      }
    }
    return out;
  },
};
"#;

fn invoke(method: &str, args: Value) -> String {
    format!(
        "(() => {{\n{}\nreturn __sweep.{}(...{});\n}})()",
        PRELUDE, method, args
    )
}

/// `{left, top, width, height}` of the plotting surface, or `null`.
pub fn chart_area(container_selector: &str, svg_selector: &str) -> String {
    invoke("chartArea", json!([container_selector, svg_selector]))
}

pub fn container_present(container_selector: &str) -> String {
    invoke("containerPresent", json!([container_selector]))
}

/// Fire `pointermove` + `mousemove` at the probe, on the element under the
/// point and on the container.
pub fn dispatch_pointer(probe: Probe, container_selector: &str) -> String {
    invoke("dispatch", json!([probe.x, probe.y, container_selector]))
}

/// Panel snapshot (hit or not), or `null` when the info block is missing.
pub fn read_panel(container_selector: &str) -> String {
    invoke("readPanel", json!([container_selector]))
}

/// Panel hit, else tooltip hit, else `null`.
pub fn read_snapshot(container_selector: &str) -> String {
    invoke("readSnapshot", json!([container_selector]))
}

pub fn click_by_text(label: &str) -> String {
    invoke("clickByText", json!([label]))
}

/// The whole probe loop as one promise resolving to the snapshot list.
pub fn sweep(
    plan: &SweepPlan,
    container_selector: &str,
    delay_ms: u64,
    hit_policy: HitPolicy,
) -> String {
    let all_hits = hit_policy == HitPolicy::AllInFan;
    invoke(
        "sweep",
        json!([plan, container_selector, delay_ms, all_hits]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::planner::ProbeColumn;

    #[test]
    fn arguments_are_json_encoded() {
        let script = read_panel(r#"div[data-id="graph"]"#);
        assert!(script.contains(r#"__sweep.readPanel(...["div[data-id=\"graph\"]"])"#));
        assert!(script.starts_with("(() => {"));
        assert!(script.ends_with("})()"));
    }

    #[test]
    fn dispatch_embeds_coordinates() {
        let script = dispatch_pointer(Probe { x: 120, y: -4 }, "#contest_graph");
        assert!(script.contains(r##"__sweep.dispatch(...[120,-4,"#contest_graph"])"##));
    }

    #[test]
    fn sweep_embeds_plan_and_policy() {
        let plan = SweepPlan {
            columns: vec![ProbeColumn { x: 10, ys: vec![1, 2] }],
        };
        let first = sweep(&plan, "#g", 15, HitPolicy::FirstPerColumn);
        assert!(first.contains(r##"__sweep.sweep(...[{"columns":[{"x":10,"ys":[1,2]}]},"#g",15,false])"##));

        let all = sweep(&plan, "#g", 15, HitPolicy::AllInFan);
        assert!(all.ends_with("15,true]);\n})()"));
    }

    #[test]
    fn label_with_quotes_stays_a_string() {
        let script = click_by_text("Code'Chef\"");
        assert!(script.contains(r#"__sweep.clickByText(...["Code'Chef\""])"#));
    }
}
