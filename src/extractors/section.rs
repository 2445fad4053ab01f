// src/extractors/section.rs
use once_cell::sync::Lazy;
use regex::Regex;

/// A conventional statement has four tables: profit or loss, financial
/// position, changes in equity and cash flows.
pub const EXPECTED_SECTION_COUNT: usize = 4;

// --- Regex Patterns (Lazy Static) ---

/// The closing line printed under every statement table. Matches variations
/// such as:
/// - "The above statement should be read in conjunction with the notes."
/// - "Above statement must be considered along with the notes."
/// - "above statement should be read carefully with the notes"
///
/// The wording in between must stay on one line (`.` does not cross `\n`).
static TABLE_BOUNDARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:The\s*)?above statement .*? with the notes\.?")
        .expect("Failed to compile TABLE_BOUNDARY_RE")
});

/// One table-candidate block of cleaned text.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// 1-based position in the document.
    pub index: usize,
    pub text: String,
}

/// True if `text` contains the end-of-table phrase.
pub fn is_table_boundary(text: &str) -> bool {
    TABLE_BOUNDARY_RE.is_match(text)
}

/// Splits cleaned statement text into table sections.
pub struct SectionSplitter {
    expected_sections: usize,
}

impl Default for SectionSplitter {
    fn default() -> Self {
        Self::new(EXPECTED_SECTION_COUNT)
    }
}

impl SectionSplitter {
    pub fn new(expected_sections: usize) -> Self {
        Self { expected_sections }
    }

    pub fn expected_sections(&self) -> usize {
        self.expected_sections
    }

    /// Splits on every boundary phrase and keeps the trimmed, non-empty pieces
    /// in document order.
    ///
    /// A count other than the expected one is logged as a warning; the caller
    /// still gets every section that was found.
    pub fn split(&self, cleaned_text: &str) -> Vec<Section> {
        if !is_table_boundary(cleaned_text) {
            tracing::warn!("No table boundary phrase found; treating the whole text as one section");
        }

        let sections: Vec<Section> = TABLE_BOUNDARY_RE
            .split(cleaned_text)
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .enumerate()
            .map(|(i, piece)| Section { index: i + 1, text: piece.to_string() })
            .collect();

        if sections.len() != self.expected_sections {
            tracing::warn!(
                "Expected {} sections, but found {}",
                self.expected_sections,
                sections.len()
            );
        } else {
            tracing::debug!("Split text into {} sections", sections.len());
        }

        sections
    }
}
