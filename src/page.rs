//! Normalized read-only view of the rendered booking page.
//!
//! The fetcher subprocess walks the rendered DOM and reports a flat,
//! ordered list of elements. Nothing here carries identity beyond its
//! position in that list.

use serde::{Deserialize, Serialize};

/// One rendered element, as reported by the fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageElement {
    /// Visible text content.
    #[serde(default)]
    pub text: String,
    /// Lowercase tag/category label (e.g. "b", "td", "gridcell").
    pub tag: String,
    /// Raw class attribute; empty when the element carries none.
    #[serde(default)]
    pub classes: String,
    /// Accessible label, when present.
    #[serde(default)]
    pub aria_label: String,
}

/// Ordered element sequence for one rendered calendar view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageModel {
    pub elements: Vec<PageElement>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_optional_attributes_default_to_empty() {
        let page: PageModel =
            serde_json::from_str(r#"{"elements": [{"text": "18:00", "tag": "b"}]}"#).unwrap();

        assert_eq!(page.elements.len(), 1);
        assert_eq!(page.elements[0].classes, "");
        assert_eq!(page.elements[0].aria_label, "");
    }
}
