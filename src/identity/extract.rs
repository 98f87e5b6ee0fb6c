use regex::Regex;

use crate::model::voter::NationalId;

/// Label printed before the number on the national id card ("national number").
pub const NATIONAL_ID_LABEL: &str = "الرقم الوطني";

/// The label, a colon, optional whitespace, then the digit run (ASCII or Arabic-Indic).
const NATIONAL_ID_PATTERN: &str = r"الرقم الوطني:\s*([0-9\x{0660}-\x{0669}]+)";

/// Finds the labelled national id in recognized text.
pub struct NationalIdExtractor {
    pattern: Regex,
}

impl Default for NationalIdExtractor {
    fn default() -> Self {
        Self {
            pattern: Regex::new(NATIONAL_ID_PATTERN).expect("pattern is valid"),
        }
    }
}

impl NationalIdExtractor {
    /// The digits following the first occurrence of the label, or `None` if
    /// the text carries no labelled number.
    pub fn extract(&self, text: &str) -> Option<NationalId> {
        self.pattern
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|digits| NationalId::from_recognized(digits.as_str()).ok())
    }
}
