// src/extractors/cleaner.rs
use once_cell::sync::Lazy;
use regex::Regex;

// --- Regex Patterns (Lazy Static) ---

/// Page header/footer lines: the fact-sheet code ("FS 023", "Fact Sheet FS 023")
/// and page-number markers such as "p. 4". Matched anywhere in the line.
static BOILERPLATE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)FS 023|Fact Sheet FS 023|p\.\s*\d+")
        .expect("Failed to compile BOILERPLATE_LINE_RE")
});

/// The copyright/legal notice closing the document. Spans lines, so `(?s)`;
/// lazy so two notices never swallow the text between them.
static LEGAL_NOTICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)© Commonwealth of Australia.*?legal advice\.")
        .expect("Failed to compile LEGAL_NOTICE_RE")
});

static LINE_BREAK_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n+").expect("Failed to compile LINE_BREAK_RUN_RE"));

/// True if the line is a page header/footer that carries no statement content.
pub fn is_boilerplate_line(line: &str) -> bool {
    BOILERPLATE_LINE_RE.is_match(line)
}

/// Removes every legal-notice block.
pub fn strip_legal_notice(text: &str) -> String {
    LEGAL_NOTICE_RE.replace_all(text, "").into_owned()
}

/// Collapses each run of consecutive line breaks into a single one.
pub fn collapse_line_breaks(text: &str) -> String {
    LINE_BREAK_RUN_RE.replace_all(text, "\n").into_owned()
}

/// Cleans raw extracted text: drops page header/footer lines, strips the
/// legal notice, collapses blank lines and trims the result.
///
/// Never fails; text without any boilerplate comes back trimmed but otherwise
/// unchanged. Applying it twice gives the same result as applying it once.
pub fn clean_text(raw_text: &str) -> String {
    let normalized = raw_text.replace("\r\n", "\n");
    let without_notice = strip_legal_notice(&normalized);

    let kept: Vec<&str> = without_notice
        .lines()
        .filter(|line| !is_boilerplate_line(line))
        .collect();
    let dropped = without_notice.lines().count() - kept.len();
    if dropped > 0 {
        tracing::debug!("Dropped {} boilerplate lines", dropped);
    }

    collapse_line_breaks(&kept.join("\n")).trim().to_string()
}
