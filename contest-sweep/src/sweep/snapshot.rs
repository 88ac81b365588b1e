use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use shared::Record;
use std::sync::LazyLock;

use super::dates::parse_date;

static RATING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{3,5}").expect("rating pattern is valid"));

const MONTH_TOKENS: [&str; 13] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec", "Sept",
];

/// UI state captured right after a probe.
///
/// Produced by the in-page reader as `{"kind": "panel", ...}` or
/// `{"kind": "tooltip", "rawText": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RawSnapshot {
    Panel(PanelSnapshot),
    Tooltip(TooltipSnapshot),
}

/// Fragments of the chart's info block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelSnapshot {
    pub rating_text: Option<String>,
    pub rating: Option<i64>,
    pub date: Option<String>,
    pub contest_name: Option<String>,
    pub rank_text: Option<String>,
    pub rank: Option<i64>,
}

impl PanelSnapshot {
    /// A panel only counts as a hit when it names a contest.
    pub fn is_hit(&self) -> bool {
        non_empty(self.contest_name.as_deref()).is_some()
    }

    /// True when the date/contest pair differs from `other`.
    pub fn differs_from(&self, other: &PanelSnapshot) -> bool {
        non_empty(self.date.as_deref()) != non_empty(other.date.as_deref())
            || non_empty(self.contest_name.as_deref()) != non_empty(other.contest_name.as_deref())
    }

    pub fn has_date_or_contest(&self) -> bool {
        non_empty(self.date.as_deref()).is_some() || non_empty(self.contest_name.as_deref()).is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TooltipSnapshot {
    pub raw_text: String,
}

impl TooltipSnapshot {
    pub fn is_hit(&self) -> bool {
        self.raw_text.trim().chars().count() > 1
    }
}

impl RawSnapshot {
    pub fn is_hit(&self) -> bool {
        match self {
            RawSnapshot::Panel(panel) => panel.is_hit(),
            RawSnapshot::Tooltip(tooltip) => tooltip.is_hit(),
        }
    }

    /// Normalize into a candidate record; `None` when nothing could be read.
    pub fn parse(&self) -> Option<Candidate> {
        let record = match self {
            RawSnapshot::Panel(panel) => parse_panel(panel),
            RawSnapshot::Tooltip(tooltip) => parse_tooltip(&tooltip.raw_text),
        };
        Candidate::new(record)
    }
}

/// A parsed record plus its resolved calendar date, used only for ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub record: Record,
    pub iso_date: Option<NaiveDate>,
}

impl Candidate {
    pub fn new(record: Record) -> Option<Self> {
        if record.is_empty() {
            return None;
        }
        let iso_date = record.date.as_deref().and_then(parse_date);
        Some(Self { record, iso_date })
    }
}

pub fn parse_panel(panel: &PanelSnapshot) -> Record {
    Record {
        rating: panel
            .rating_text
            .as_deref()
            .and_then(digits_as_int)
            .or(panel.rating),
        date: non_empty(panel.date.as_deref()),
        contest_name: non_empty(panel.contest_name.as_deref()),
        rank: panel
            .rank_text
            .as_deref()
            .and_then(digits_as_int)
            .or(panel.rank),
    }
}

/// Line-oriented best-effort read of free tooltip text.
///
/// Every line is checked for a rank, a contest and a trailing date. The first
/// rating candidate carrying a 3-5 digit run supplies the rating; rank and
/// contest lines are not candidates, and a dated line only offers the text
/// before its date.
pub fn parse_tooltip(raw_text: &str) -> Record {
    let mut record = Record::default();

    for line in raw_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let is_rank = line.contains("Rank");
        if is_rank && record.rank.is_none() {
            record.rank = digits_as_int(line);
        }

        let is_contest = line.contains("Contest") || line.contains("contest");
        if is_contest {
            record.contest_name = Some(line.to_string());
        }

        let rating_text = match split_date(line) {
            Some((head, date)) => {
                record.date = Some(date);
                head
            }
            None => line.to_string(),
        };

        if is_rank || is_contest || record.rating.is_some() {
            continue;
        }
        record.rating = RATING_PATTERN
            .find(&rating_text)
            .and_then(|m| m.as_str().parse().ok());
    }

    record
}

// "Rating 1600 08 Jan 2022" -> ("Rating 1600", "08 Jan 2022")
fn split_date(line: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return None;
    }
    let year = parts[parts.len() - 1];
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (head, tail) = parts.split_at(parts.len() - 3);
    let tail = tail.join(" ");
    MONTH_TOKENS
        .iter()
        .any(|month| tail.contains(month))
        .then(|| (head.join(" "), tail))
}

fn digits_as_int(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel(date: &str, contest: &str, rating: &str, rank: &str) -> PanelSnapshot {
        PanelSnapshot {
            rating_text: Some(rating.into()),
            rating: None,
            date: Some(date.into()),
            contest_name: Some(contest.into()),
            rank_text: Some(rank.into()),
            rank: None,
        }
    }

    #[test]
    fn tooltip_with_all_fields() {
        let record = parse_tooltip("Rank 120\n1600\nWeekly Contest 300\n08 Jan 2022");
        assert_eq!(
            record,
            Record {
                rating: Some(1600),
                date: Some("08 Jan 2022".into()),
                contest_name: Some("Weekly Contest 300".into()),
                rank: Some(120),
            }
        );
    }

    #[test]
    fn tooltip_first_rank_and_rating_win() {
        let record = parse_tooltip("Rank: 1,204\nRank 9\n  1450  \n1999");
        assert_eq!(record.rank, Some(1204));
        assert_eq!(record.rating, Some(1450));
    }

    #[test]
    fn tooltip_last_contest_and_date_win() {
        let text = "Biweekly contest 12\n01 Feb 2021\nWeekly Contest 99\nSat 06 Mar 2021";
        let record = parse_tooltip(text);
        assert_eq!(record.contest_name.as_deref(), Some("Weekly Contest 99"));
        assert_eq!(record.date.as_deref(), Some("06 Mar 2021"));
        assert_eq!(record.rating, None);
    }

    #[test]
    fn tooltip_rank_line_still_carries_contest_and_date() {
        let text = "Rank 120\n1600\nWeekly Contest 300 Rank 5\nRank 7 08 Jan 2022";
        let record = parse_tooltip(text);
        assert_eq!(
            record,
            Record {
                rating: Some(1600),
                date: Some("08 Jan 2022".into()),
                contest_name: Some("Weekly Contest 300 Rank 5".into()),
                rank: Some(120),
            }
        );
    }

    #[test]
    fn tooltip_combined_lines_without_separate_rank() {
        let record = parse_tooltip("1600\nWeekly Contest 300 Rank 120\nRank 120 08 Jan 2022");
        assert_eq!(record.rating, Some(1600));
        assert_eq!(record.contest_name.as_deref(), Some("Weekly Contest 300 Rank 120"));
        assert_eq!(record.date.as_deref(), Some("08 Jan 2022"));
    }

    #[test]
    fn tooltip_rating_before_date_on_same_line() {
        let record = parse_tooltip("Weekly Contest 300\nRating 1600 08 Jan 2022");
        assert_eq!(record.rating, Some(1600));
        assert_eq!(record.date.as_deref(), Some("08 Jan 2022"));
        assert_eq!(record.contest_name.as_deref(), Some("Weekly Contest 300"));
    }

    #[test]
    fn tooltip_date_alone_is_not_a_rating() {
        let record = parse_tooltip("08 Jan 2022\n1750");
        assert_eq!(record.rating, Some(1750));
    }

    #[test]
    fn tooltip_recognizes_sept_alias() {
        let record = parse_tooltip("12 Sept 2023");
        assert_eq!(record.date.as_deref(), Some("12 Sept 2023"));
    }

    #[test]
    fn tooltip_rejects_lines_without_month_or_year() {
        let record = parse_tooltip("played on 12 34 2023\nStarters 2023x");
        assert_eq!(record.date, None);
    }

    #[test]
    fn tooltip_with_nothing_useful_is_empty() {
        assert!(parse_tooltip("\n  \n-\n").is_empty());
        assert!(RawSnapshot::Tooltip(TooltipSnapshot { raw_text: "ab".into() })
            .parse()
            .is_none());
    }

    #[test]
    fn panel_fields_map_directly() {
        let record = parse_panel(&panel("01 Jan 2022", "Weekly 1", "Rating: 1500", "Rank #42"));
        assert_eq!(
            record,
            Record {
                rating: Some(1500),
                date: Some("01 Jan 2022".into()),
                contest_name: Some("Weekly 1".into()),
                rank: Some(42),
            }
        );
    }

    #[test]
    fn panel_without_digits_has_null_numbers() {
        let record = parse_panel(&panel("01 Jan 2022", "Weekly 1", "--", ""));
        assert_eq!(record.rating, None);
        assert_eq!(record.rank, None);
    }

    #[test]
    fn panel_falls_back_to_page_parsed_numbers() {
        let snapshot = PanelSnapshot {
            rating: Some(1700),
            contest_name: Some("Round 5".into()),
            ..PanelSnapshot::default()
        };
        assert_eq!(parse_panel(&snapshot).rating, Some(1700));
    }

    #[test]
    fn hit_rules() {
        assert!(panel("", "Weekly 1", "", "").is_hit());
        assert!(!panel("01 Jan 2022", "  ", "1500", "").is_hit());
        assert!(TooltipSnapshot { raw_text: " 12 ".into() }.is_hit());
        assert!(!TooltipSnapshot { raw_text: " 1 ".into() }.is_hit());
    }

    #[test]
    fn panel_change_detection() {
        let old = panel("01 Jan 2022", "Weekly 1", "1500", "");
        let same = panel(" 01 Jan 2022 ", "Weekly 1", "1600", "3");
        let new = panel("08 Jan 2022", "Weekly 2", "1550", "");
        assert!(!same.differs_from(&old));
        assert!(new.differs_from(&old));
        assert!(!PanelSnapshot::default().has_date_or_contest());
    }

    #[test]
    fn candidate_resolves_iso_date() {
        let candidate = RawSnapshot::Panel(panel("15 Sept 2023", "Round 1", "1200", ""))
            .parse()
            .unwrap();
        assert_eq!(candidate.iso_date, NaiveDate::from_ymd_opt(2023, 9, 15));

        let undated = RawSnapshot::Tooltip(TooltipSnapshot {
            raw_text: "Weekly Contest 7".into(),
        })
        .parse()
        .unwrap();
        assert_eq!(undated.iso_date, None);
    }

    #[test]
    fn snapshots_deserialize_from_tagged_json() {
        let panel: RawSnapshot = serde_json::from_value(serde_json::json!({
            "kind": "panel",
            "ratingText": "1500",
            "rating": 1500,
            "date": "01 Jan 2022",
            "contestName": "Weekly 1",
            "rankText": null,
            "rank": null
        }))
        .unwrap();
        assert!(matches!(panel, RawSnapshot::Panel(ref p) if p.rating == Some(1500)));

        let tooltip: RawSnapshot = serde_json::from_value(serde_json::json!({
            "kind": "tooltip",
            "rawText": "Rank 3"
        }))
        .unwrap();
        assert_eq!(
            tooltip,
            RawSnapshot::Tooltip(TooltipSnapshot { raw_text: "Rank 3".into() })
        );
    }
}
