//! Renders the new-slot digest that gets printed and emailed.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::slot::CandidateSlot;

const RULE: &str = "----------------------------------------------------------------------";

/// Render new slots grouped by date, ascending; within one date the input
/// order is preserved. Returns `None` when there is nothing to report so
/// callers can skip notification entirely.
pub fn render(new_slots: &[CandidateSlot]) -> Option<String> {
    if new_slots.is_empty() {
        return None;
    }

    let mut by_date: BTreeMap<&str, Vec<&CandidateSlot>> = BTreeMap::new();
    for slot in new_slots {
        by_date.entry(slot.date.as_str()).or_default().push(slot);
    }

    let mut body = String::new();
    for (date, slots) in &by_date {
        body.push_str(&heading(date));
        body.push_str(RULE);
        body.push('\n');
        for slot in slots {
            body.push_str(&format!("  🎾 {} [{}]\n", slot.text, slot.element_type));
        }
    }

    Some(body)
}

/// Date heading with a best-effort day name. An unparseable date string
/// degrades to the raw value; this never errors.
fn heading(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(parsed) => format!("\n📅 {} ({})\n", date, parsed.format("%A")),
        Err(_) => format!("\n📅 {}\n", date),
    }
}
