use std::collections::HashMap;

use shared::{Record, Series};

use super::snapshot::Candidate;

type DedupKey = (String, String);

fn dedup_key(candidate: &Candidate) -> DedupKey {
    let date = match candidate.iso_date {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => candidate.record.date.clone().unwrap_or_default(),
    };
    let contest = candidate
        .record
        .contest_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    (date, contest)
}

/// Collapse probe-ordered candidates into the final series.
///
/// Duplicates (same date and contest) keep the most complete record; on equal
/// completeness the first one seen stays. Dated records come first in
/// ascending date order, followed by undated ones ordered by their raw date.
pub fn reconcile<I>(candidates: I) -> Series
where
    I: IntoIterator<Item = Candidate>,
{
    let mut slots: Vec<Candidate> = Vec::new();
    let mut index: HashMap<DedupKey, usize> = HashMap::new();

    for candidate in candidates {
        if candidate.record.is_empty() {
            continue;
        }
        let key = dedup_key(&candidate);
        match index.get(&key) {
            Some(&slot) => {
                if candidate.record.score() > slots[slot].record.score() {
                    slots[slot] = candidate;
                }
            }
            None => {
                index.insert(key, slots.len());
                slots.push(candidate);
            }
        }
    }

    let (mut dated, mut undated): (Vec<Candidate>, Vec<Candidate>) =
        slots.into_iter().partition(|c| c.iso_date.is_some());

    dated.sort_by_key(|c| c.iso_date);
    undated.sort_by(|a, b| {
        let a = a.record.date.as_deref().unwrap_or_default();
        let b = b.record.date.as_deref().unwrap_or_default();
        a.cmp(b)
    });

    dated
        .into_iter()
        .chain(undated)
        .map(|c| c.record)
        .collect::<Vec<Record>>()
}
