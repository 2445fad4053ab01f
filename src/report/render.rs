// src/report/render.rs
//! Markdown summary to paginated PDF.
//!
//! Only the markdown the summary prompt produces is understood: headings,
//! paragraphs, bullet and numbered lists, pipe tables and horizontal rules.
//! Headings up to level 3 also become PDF bookmarks.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Bookmark, Document, Object, ObjectId, Stream, StringFormat};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::error::RenderError;

pub const DEFAULT_TITLE: &str = "Financial Summary Report";

// A4 in points.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 56.0;
const BODY_SIZE: f32 = 11.0;
const MONO_SIZE: f32 = 9.0;
const LEADING: f32 = 1.35;
const BOOKMARK_DEPTH: u8 = 3;

static TABLE_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\|?\s*:?-{2,}:?\s*(\|\s*:?-{2,}:?\s*)*\|?$")
        .expect("Failed to compile TABLE_SEPARATOR_RE")
});

static NUMBERED_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)[.)]\s+(.*)$").expect("Failed to compile NUMBERED_ITEM_RE"));

/// Prefixes `# Financial Summary Report` unless the text already opens with a
/// level-1 heading.
pub fn ensure_title(markdown: &str) -> Cow<'_, str> {
    if markdown.trim().starts_with("# ") {
        Cow::Borrowed(markdown)
    } else {
        Cow::Owned(format!("# {}\n\n{}", DEFAULT_TITLE, markdown))
    }
}

/// In debug mode an existing `report.pdf` is kept and the next free
/// `report1.pdf`, `report2.pdf`, … is used instead. Otherwise the path is
/// returned as-is and will be overwritten.
pub fn resolve_output_path(path: &Path, debug: bool) -> PathBuf {
    if !debug || !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let mut counter = 1;
    loop {
        let candidate = parent.join(format!("{}{}{}", stem, counter, ext));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Renders markdown to a PDF file and returns the path actually written.
pub fn save_markdown_to_pdf(markdown: &str, output_path: &Path, debug: bool) -> Result<PathBuf, RenderError> {
    let markdown = ensure_title(markdown);
    let output_path = resolve_output_path(output_path, debug);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let pages = paginate(layout_markdown(&markdown));
    let mut document = build_document(&pages)?;
    document.save(&output_path)?;

    tracing::info!("Summary saved as {} ({} pages)", output_path.display(), pages.len());
    Ok(output_path)
}

// --- Layout ---

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineStyle {
    Heading(u8),
    Body,
    Mono,
    Rule,
    Blank,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub style: LineStyle,
    pub indent: f32,
    pub text: String,
}

impl Line {
    fn new(style: LineStyle, indent: f32, text: impl Into<String>) -> Self {
        Self { style, indent, text: text.into() }
    }

    fn blank() -> Self {
        Self::new(LineStyle::Blank, 0.0, "")
    }

    fn font_size(&self) -> f32 {
        match self.style {
            LineStyle::Heading(1) => 20.0,
            LineStyle::Heading(2) => 16.0,
            LineStyle::Heading(_) => 13.0,
            LineStyle::Mono => MONO_SIZE,
            LineStyle::Body | LineStyle::Rule | LineStyle::Blank => BODY_SIZE,
        }
    }

    fn height(&self) -> f32 {
        match self.style {
            LineStyle::Heading(_) => self.font_size() * LEADING + 6.0,
            LineStyle::Blank => BODY_SIZE * 0.6,
            LineStyle::Rule => BODY_SIZE,
            _ => self.font_size() * LEADING,
        }
    }
}

/// Average glyph width as a fraction of the font size; Courier is exact.
fn chars_per_line(style: LineStyle, indent: f32) -> usize {
    let (size, width_factor) = match style {
        LineStyle::Mono => (MONO_SIZE, 0.6),
        LineStyle::Heading(1) => (20.0, 0.55),
        LineStyle::Heading(2) => (16.0, 0.55),
        LineStyle::Heading(_) => (13.0, 0.55),
        _ => (BODY_SIZE, 0.5),
    };
    let usable = PAGE_WIDTH - 2.0 * MARGIN - indent;
    ((usable / (size * width_factor)).floor() as usize).max(10)
}

/// Word-wraps to at most `width` characters, hard-splitting longer words.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..width).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() { word.chars().count() } else { current.chars().count() + 1 + word.chars().count() };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Drops inline emphasis and code markers.
fn strip_inline(text: &str) -> String {
    text.replace("**", "").replace("__", "").replace('`', "")
}

fn table_cells(row: &str) -> Vec<String> {
    let trimmed = row.trim().trim_start_matches('|').trim_end_matches('|');
    trimmed.split('|').map(|c| strip_inline(c.trim())).collect()
}

fn push_table(rows: &[Vec<String>], out: &mut Vec<Line>) {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let max_chars = chars_per_line(LineStyle::Mono, 0.0);
    for row in rows {
        let padded: Vec<String> = (0..columns)
            .map(|i| {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                format!("{:<width$}", cell, width = widths[i])
            })
            .collect();
        let joined = padded.join("  ").trim_end().to_string();
        for piece in wrap_mono(&joined, max_chars) {
            out.push(Line::new(LineStyle::Mono, 0.0, piece));
        }
    }
}

/// Splits monospace text at a fixed width, keeping inner spacing.
fn wrap_mono(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}

fn push_wrapped(style: LineStyle, indent: f32, first_prefix: &str, text: &str, out: &mut Vec<Line>) {
    let width = chars_per_line(style, indent);
    let content = format!("{}{}", first_prefix, text);
    let pieces = wrap(&content, width);
    if pieces.is_empty() {
        out.push(Line::new(style, indent, first_prefix.trim_end()));
        return;
    }
    for piece in pieces {
        out.push(Line::new(style, indent, piece));
    }
}

/// Turns markdown into styled, wrapped lines.
pub fn layout_markdown(markdown: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut table: Vec<Vec<String>> = Vec::new();

    for raw in markdown.lines() {
        let line = raw.trim_end();
        let trimmed = line.trim_start();

        if trimmed.starts_with('|') {
            if !TABLE_SEPARATOR_RE.is_match(trimmed) {
                table.push(table_cells(trimmed));
            }
            continue;
        }
        if !table.is_empty() {
            push_table(&table, &mut lines);
            table.clear();
        }

        if trimmed.is_empty() {
            if lines.last().map_or(false, |l: &Line| l.style != LineStyle::Blank) {
                lines.push(Line::blank());
            }
            continue;
        }

        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        if (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ') {
            let text = strip_inline(trimmed[hashes..].trim());
            let level = hashes as u8;
            push_wrapped(LineStyle::Heading(level), 0.0, "", &text, &mut lines);
            continue;
        }

        if matches!(trimmed, "---" | "***" | "___") {
            lines.push(Line::new(LineStyle::Rule, 0.0, ""));
            continue;
        }

        let indent = (line.len() - trimmed.len()) as f32 * 3.0;
        if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
            .or_else(|| trimmed.strip_prefix("+ "))
        {
            push_wrapped(LineStyle::Body, indent + 12.0, "• ", &strip_inline(item), &mut lines);
            continue;
        }
        if let Some(caps) = NUMBERED_ITEM_RE.captures(trimmed) {
            let prefix = format!("{}. ", &caps[1]);
            push_wrapped(LineStyle::Body, indent + 12.0, &prefix, &strip_inline(&caps[2]), &mut lines);
            continue;
        }

        push_wrapped(LineStyle::Body, indent, "", &strip_inline(trimmed), &mut lines);
    }

    if !table.is_empty() {
        push_table(&table, &mut lines);
    }
    lines
}

/// Distributes lines over pages top to bottom. Blank lines never open a page.
pub fn paginate(lines: Vec<Line>) -> Vec<Vec<Line>> {
    let usable = PAGE_HEIGHT - 2.0 * MARGIN;
    let mut pages: Vec<Vec<Line>> = Vec::new();
    let mut current: Vec<Line> = Vec::new();
    let mut used = 0.0;

    for line in lines {
        let height = line.height();
        if used + height > usable && !current.is_empty() {
            pages.push(std::mem::take(&mut current));
            used = 0.0;
        }
        if current.is_empty() && line.style == LineStyle::Blank {
            continue;
        }
        used += height;
        current.push(line);
    }

    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }
    pages
}

// --- PDF ---

/// Maps text to WinAnsiEncoding bytes; unmappable characters become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            ' '..='~' => ch as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            '\u{A0}'..='\u{FF}' => ch as u32 as u8,
            _ => b'?',
        })
        .collect()
}

fn font_for(style: LineStyle) -> &'static str {
    match style {
        LineStyle::Heading(_) => "F2",
        LineStyle::Mono => "F3",
        _ => "F1",
    }
}

fn page_operations(lines: &[Line]) -> Vec<Operation> {
    let mut operations = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in lines {
        y -= line.height();
        match line.style {
            LineStyle::Blank => {}
            LineStyle::Rule => {
                let rule_y = y + line.height() / 2.0;
                operations.push(Operation::new("w", vec![0.5_f32.into()]));
                operations.push(Operation::new("m", vec![MARGIN.into(), rule_y.into()]));
                operations.push(Operation::new("l", vec![(PAGE_WIDTH - MARGIN).into(), rule_y.into()]));
                operations.push(Operation::new("S", vec![]));
            }
            _ => {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new(
                    "Tf",
                    vec![font_for(line.style).into(), line.font_size().into()],
                ));
                operations.push(Operation::new("Td", vec![(MARGIN + line.indent).into(), y.into()]));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(encode_win_ansi(&line.text), StringFormat::Literal)],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
        }
    }

    operations
}

fn build_document(pages: &[Vec<Line>]) -> Result<Document, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font = |doc: &mut Document, base: &str| -> ObjectId {
        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base,
            "Encoding" => "WinAnsiEncoding",
        })
    };
    let regular = font(&mut doc, "Helvetica");
    let bold = font(&mut doc, "Helvetica-Bold");
    let mono = font(&mut doc, "Courier");
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
            "F3" => mono,
        },
    });

    let mut page_ids = Vec::with_capacity(pages.len());
    // (level, bookmark id) of the open heading chain.
    let mut bookmark_stack: Vec<(u8, u32)> = Vec::new();

    for lines in pages {
        let content = Content { operations: page_operations(lines) };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);

        let mut previous_was_heading = false;
        for line in lines {
            let LineStyle::Heading(level) = line.style else {
                previous_was_heading = false;
                continue;
            };
            // A wrapped heading spans several lines; bookmark only the first.
            if previous_was_heading || level > BOOKMARK_DEPTH {
                previous_was_heading = true;
                continue;
            }
            previous_was_heading = true;

            while bookmark_stack.last().is_some_and(|(open, _)| *open >= level) {
                bookmark_stack.pop();
            }
            let parent = bookmark_stack.last().map(|(_, id)| *id);
            let id = doc.add_bookmark(
                Bookmark::new(line.text.clone(), [0.0, 0.0, 0.0], 0, page_id),
                parent,
            );
            bookmark_stack.push((level, id));
        }
    }

    let page_count = i64::try_from(page_ids.len())?;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| (*id).into()).collect::<Vec<Object>>(),
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if let Some(outline_id) = doc.build_outline() {
        catalog.set("Outlines", outline_id);
        catalog.set("PageMode", "UseOutlines");
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[Line]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn adds_default_title_when_missing() {
        let titled = ensure_title("## Key metrics\nRevenue rose.");
        assert_eq!(titled, "# Financial Summary Report\n\n## Key metrics\nRevenue rose.");
        assert!(matches!(titled, Cow::Owned(_)));
    }

    #[test]
    fn keeps_existing_title() {
        let markdown = "\n# Acme Ltd summary\nAll good.";
        let titled = ensure_title(markdown);
        assert!(matches!(titled, Cow::Borrowed(_)));
        assert_eq!(titled, markdown);
    }

    #[test]
    fn level_two_heading_is_not_a_title() {
        assert!(ensure_title("##Not a title").starts_with("# Financial Summary Report"));
    }

    #[test]
    fn non_debug_path_is_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.pdf");
        std::fs::write(&path, b"old").unwrap();
        assert_eq!(resolve_output_path(&path, false), path);
    }

    #[test]
    fn debug_path_gets_next_free_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.pdf");
        assert_eq!(resolve_output_path(&path, true), path);

        std::fs::write(&path, b"0").unwrap();
        std::fs::write(tmp.path().join("report1.pdf"), b"1").unwrap();
        assert_eq!(resolve_output_path(&path, true), tmp.path().join("report2.pdf"));
    }

    #[test]
    fn saving_twice_in_debug_mode_keeps_both_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("summary_report.pdf");

        let first = save_markdown_to_pdf("Revenue rose.", &path, true).unwrap();
        let second = save_markdown_to_pdf("Revenue fell.", &path, true).unwrap();

        assert_eq!(first, path);
        assert_eq!(second, tmp.path().join("summary_report1.pdf"));
        assert!(first.is_file() && second.is_file());
    }

    #[test]
    fn wrap_respects_width_and_splits_long_words() {
        assert_eq!(wrap("one two three four", 9), vec!["one two", "three", "four"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert!(wrap("   ", 10).is_empty());
    }

    #[test]
    fn layout_styles_markdown_blocks() {
        let markdown = "# Title\n\n## Metrics\n| Metric | Value | Notes |\n|---|---:|---|\n| Revenue | 100 | up |\n\n- **Strong** cash\n1. First\n---\nClosing words.";
        let lines = layout_markdown(markdown);

        let styles: Vec<LineStyle> = lines.iter().map(|l| l.style).collect();
        assert_eq!(
            styles,
            vec![
                LineStyle::Heading(1),
                LineStyle::Blank,
                LineStyle::Heading(2),
                LineStyle::Mono,
                LineStyle::Mono,
                LineStyle::Blank,
                LineStyle::Body,
                LineStyle::Body,
                LineStyle::Rule,
                LineStyle::Body,
            ]
        );
        assert_eq!(
            texts(&lines),
            vec![
                "Title",
                "",
                "Metrics",
                "Metric   Value  Notes",
                "Revenue  100    up",
                "",
                "• Strong cash",
                "1. First",
                "",
                "Closing words.",
            ]
        );
    }

    #[test]
    fn long_documents_paginate() {
        let markdown = (0..200).map(|i| format!("Paragraph {} of the summary.\n", i)).collect::<String>();
        let pages = paginate(layout_markdown(&markdown));
        assert!(pages.len() > 1);
        assert!(pages.iter().all(|p| p.first().map_or(true, |l| l.style != LineStyle::Blank)));
    }

    #[test]
    fn empty_markdown_still_has_one_page() {
        assert_eq!(paginate(Vec::new()).len(), 1);
    }

    #[test]
    fn encodes_typographic_characters() {
        assert_eq!(encode_win_ansi("a–b • ✅"), vec![b'a', 0x96, b'b', b' ', 0x95, b' ', b'?']);
    }

    #[test]
    fn rendered_pdf_has_pages_and_outline() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out/summary.pdf");
        let markdown = format!(
            "# Summary\n## Metrics\n{}\n## Outlook\nStable.",
            "Revenue grew steadily across the year. ".repeat(400)
        );

        let written = save_markdown_to_pdf(&markdown, &path, false).unwrap();

        let doc = Document::load(&written).unwrap();
        assert!(doc.get_pages().len() > 1);
        let root = doc.trailer.get(b"Root").and_then(Object::as_reference).unwrap();
        assert!(doc.get_dictionary(root).unwrap().has(b"Outlines"));
    }
}
