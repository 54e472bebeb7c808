//! Slot extraction and availability classification.
//!
//! Best-effort parse of third-party presentation markup with no schema
//! guarantee. The heuristic is deliberately permissive: an element with no
//! class information defaults to Available rather than being discarded,
//! trading false positives for never silently missing a real opening.

use chrono::{Datelike, NaiveDate, Weekday};

use crate::config::{MarkerConfig, ScheduleConfig};
use crate::page::PageModel;
use crate::slot::{Availability, CandidateSlot};

/// Tags the remote site uses for time headers.
const EMPHASIS_TAGS: &[&str] = &["b", "strong", "em"];

/// Tags making up table/grid calendar layouts.
const GRID_CELL_TAGS: &[&str] = &["td", "gridcell"];

/// Which opening-hours template applies to a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    Weekday,
    Weekend,
}

impl ScheduleKind {
    pub fn for_date(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => ScheduleKind::Weekend,
            _ => ScheduleKind::Weekday,
        }
    }

    fn labels<'a>(&self, schedule: &'a ScheduleConfig) -> &'a [String] {
        match self {
            ScheduleKind::Weekday => &schedule.weekday_times,
            ScheduleKind::Weekend => &schedule.weekend_times,
        }
    }
}

pub struct SlotExtractor {
    schedule: ScheduleConfig,
    markers: MarkerConfig,
}

impl SlotExtractor {
    pub fn new(schedule: ScheduleConfig, markers: MarkerConfig) -> Self {
        SlotExtractor { schedule, markers }
    }

    /// Scan one rendered day for candidate slots.
    ///
    /// Never errors: unrecognized markup simply produces no candidates,
    /// and an empty result is a valid outcome. The secondary grid pass may
    /// duplicate primary-pass output under the same key; deduplication is
    /// the store's job, not this one's.
    pub fn extract(
        &self,
        page: &PageModel,
        date: NaiveDate,
        kind: ScheduleKind,
    ) -> Vec<CandidateSlot> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let labels = kind.labels(&self.schedule);
        let mut slots = Vec::new();

        // Primary pass: emphasis-tagged time headers matching a canonical
        // label for the active schedule.
        for element in &page.elements {
            if !EMPHASIS_TAGS.contains(&element.tag.as_str()) {
                continue;
            }
            if !labels.iter().any(|label| element.text.contains(label.as_str())) {
                continue;
            }
            if self.classify(&element.classes) != Availability::Available {
                continue;
            }
            let text = element.text.trim();
            if text.is_empty() {
                continue;
            }
            slots.push(CandidateSlot {
                date: date_str.clone(),
                text: text.to_string(),
                element_type: element.tag.clone(),
                classes: element.classes.clone(),
            });
        }

        // Secondary pass: any grid cell that looks like it holds a time or
        // an accessible "available" label. Covers calendar layouts the
        // primary pass misses.
        for element in &page.elements {
            if !GRID_CELL_TAGS.contains(&element.tag.as_str()) {
                continue;
            }
            let text = element.text.trim();
            let aria = element.aria_label.trim();
            if text.is_empty() && aria.is_empty() {
                continue;
            }
            let looks_like_slot = text.chars().any(|c| c.is_ascii_digit())
                || aria.to_lowercase().contains("available");
            if !looks_like_slot {
                continue;
            }
            let label = if text.is_empty() { aria } else { text };
            slots.push(CandidateSlot {
                date: date_str.clone(),
                text: label.to_string(),
                element_type: "calendar_cell".to_string(),
                classes: String::new(),
            });
        }

        slots
    }

    /// Classify an element by its raw class attribute, case-insensitively.
    ///
    /// A booked marker wins over everything else. An available marker, or
    /// no class attribute at all, reads as Available. Any other class
    /// combination is Unknown and gets discarded by the caller.
    pub fn classify(&self, classes: &str) -> Availability {
        let lower = classes.to_lowercase();

        if self.markers.booked.iter().any(|m| lower.contains(m.as_str())) {
            return Availability::Booked;
        }
        if classes.is_empty()
            || self.markers.available.iter().any(|m| lower.contains(m.as_str()))
        {
            return Availability::Available;
        }
        Availability::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageElement;
    use crate::slot::slot_key;

    fn make_extractor() -> SlotExtractor {
        SlotExtractor::new(ScheduleConfig::default(), MarkerConfig::default())
    }

    fn emphasis(text: &str, classes: &str) -> PageElement {
        PageElement {
            text: text.to_string(),
            tag: "b".to_string(),
            classes: classes.to_string(),
            aria_label: String::new(),
        }
    }

    fn cell(text: &str, aria_label: &str) -> PageElement {
        PageElement {
            text: text.to_string(),
            tag: "td".to_string(),
            classes: String::new(),
            aria_label: aria_label.to_string(),
        }
    }

    fn friday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    #[test]
    fn test_emphasis_time_header_without_classes_is_available() {
        let extractor = make_extractor();
        let page = PageModel {
            elements: vec![emphasis("18:00", "")],
        };

        let slots = extractor.extract(&page, friday(), ScheduleKind::Weekday);

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].text, "18:00");
        assert_eq!(slots[0].element_type, "b");
        assert_eq!(slot_key(&slots[0]), "2024-05-10T18:00");
    }

    #[test]
    fn test_booked_marker_suppresses_slot() {
        let extractor = make_extractor();
        let page = PageModel {
            elements: vec![emphasis("18:00", "slot varattu")],
        };

        let slots = extractor.extract(&page, friday(), ScheduleKind::Weekday);
        assert!(slots.is_empty());
    }

    #[test]
    fn test_booked_marker_wins_over_available_marker() {
        let extractor = make_extractor();

        assert_eq!(
            extractor.classify("slot vapaana varattu"),
            Availability::Booked
        );
        assert_eq!(extractor.classify("BOOKED available"), Availability::Booked);
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        let extractor = make_extractor();

        assert_eq!(extractor.classify("VapaanA"), Availability::Available);
        assert_eq!(extractor.classify("DISABLED"), Availability::Booked);
    }

    #[test]
    fn test_empty_class_defaults_to_available() {
        let extractor = make_extractor();
        assert_eq!(extractor.classify(""), Availability::Available);
    }

    #[test]
    fn test_unrecognized_classes_are_unknown_and_discarded() {
        let extractor = make_extractor();
        assert_eq!(extractor.classify("slot primary"), Availability::Unknown);

        let page = PageModel {
            elements: vec![emphasis("18:00", "slot primary")],
        };
        let slots = extractor.extract(&page, friday(), ScheduleKind::Weekday);
        assert!(slots.is_empty());
    }

    #[test]
    fn test_non_emphasis_time_text_not_picked_up_by_primary_pass() {
        let extractor = make_extractor();
        let page = PageModel {
            elements: vec![PageElement {
                text: "18:00".to_string(),
                tag: "div".to_string(),
                classes: String::new(),
                aria_label: String::new(),
            }],
        };

        let slots = extractor.extract(&page, friday(), ScheduleKind::Weekday);
        assert!(slots.is_empty());
    }

    #[test]
    fn test_weekend_labels_only_match_on_weekend_schedule() {
        let extractor = make_extractor();
        let page = PageModel {
            elements: vec![emphasis("10:30", "")],
        };

        let weekday = extractor.extract(&page, friday(), ScheduleKind::Weekday);
        assert!(weekday.is_empty());

        let saturday = NaiveDate::from_ymd_opt(2024, 5, 11).unwrap();
        let weekend = extractor.extract(&page, saturday, ScheduleKind::Weekend);
        assert_eq!(weekend.len(), 1);
        assert_eq!(weekend[0].text, "10:30");
    }

    #[test]
    fn test_schedule_kind_from_weekday() {
        assert_eq!(ScheduleKind::for_date(friday()), ScheduleKind::Weekday);

        let saturday = NaiveDate::from_ymd_opt(2024, 5, 11).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2024, 5, 12).unwrap();
        assert_eq!(ScheduleKind::for_date(saturday), ScheduleKind::Weekend);
        assert_eq!(ScheduleKind::for_date(sunday), ScheduleKind::Weekend);
    }

    #[test]
    fn test_grid_cell_with_digit_emitted_as_calendar_cell() {
        let extractor = make_extractor();
        let page = PageModel {
            elements: vec![cell("17:30", "")],
        };

        let slots = extractor.extract(&page, friday(), ScheduleKind::Weekday);

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].element_type, "calendar_cell");
        assert_eq!(slots[0].text, "17:30");
        assert_eq!(slots[0].classes, "");
    }

    #[test]
    fn test_grid_cell_with_available_aria_label_uses_label_as_text() {
        let extractor = make_extractor();
        let page = PageModel {
            elements: vec![cell("", "Court 3 Available at 18:00")],
        };

        let slots = extractor.extract(&page, friday(), ScheduleKind::Weekday);

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].text, "Court 3 Available at 18:00");
    }

    #[test]
    fn test_grid_cell_without_digits_or_available_label_skipped() {
        let extractor = make_extractor();
        let page = PageModel {
            elements: vec![cell("Kenttä", "varattu")],
        };

        let slots = extractor.extract(&page, friday(), ScheduleKind::Weekday);
        assert!(slots.is_empty());
    }

    #[test]
    fn test_secondary_pass_may_duplicate_primary_pass() {
        // The grid pass is allowed to re-emit the same slot; the store's
        // idempotent merge collapses the duplicates.
        let extractor = make_extractor();
        let page = PageModel {
            elements: vec![emphasis("18:00", ""), cell("18:00", "")],
        };

        let slots = extractor.extract(&page, friday(), ScheduleKind::Weekday);

        assert_eq!(slots.len(), 2);
        assert_eq!(slot_key(&slots[0]), slot_key(&slots[1]));
    }

    #[test]
    fn test_empty_page_yields_empty_result() {
        let extractor = make_extractor();
        let slots = extractor.extract(&PageModel::default(), friday(), ScheduleKind::Weekday);
        assert!(slots.is_empty());
    }
}
