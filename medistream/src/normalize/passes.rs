// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

// Rewrite passes
//
// Each pass maps the whole string to a new string. Passes agree on one
// definition of a bold span: leftmost `**...**` on a single line with no
// `*` inside. A heading is a bold span whose text starts with a letter and
// that does not sit behind a list marker or a glued dash.

use regex::{Captures, Regex};

use crate::config::WordRepair;

/// Fixed-shape patterns shared by the structural passes.
pub(super) struct StructurePatterns {
    dangling_bullet: Regex,
    padded_bold: Regex,
    bold: Regex,
    list_prefix: Regex,
    heading_line: Regex,
    list_item_line: Regex,
    period_dash: Regex,
    unspaced_marker: Regex,
    glued_bold_item: Regex,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("structure pattern {pattern:?} is invalid: {e}"))
}

impl StructurePatterns {
    /// Panics on invalid regex (these are our own patterns).
    pub(super) fn compile() -> Self {
        Self {
            dangling_bullet: compile(r"(?m)^[ \t]*[-*•][ \t]*$"),
            padded_bold: compile(r"\*\*[ \t]*([^*\n]*?)[ \t]*\*\*"),
            bold: compile(r"\*\*([^*\n]+?)\*\*"),
            list_prefix: compile(r"^[ \t]*(?:[-*•]|\d+[.)])[ \t]*$"),
            heading_line: compile(r"^\*\*[A-Za-z][^*\n]*\*\*$"),
            list_item_line: compile(r"^(?:[-*•]|\d+[.)])[ \t]"),
            period_dash: compile(r"([A-Za-z0-9])\.[ \t]*-[ \t]+"),
            unspaced_marker: compile(r"(?m)^([ \t]*)-(\*\*|[A-Za-z])"),
            glued_bold_item: compile(r"([A-Za-z])[ \t]*-[ \t]*\*\*"),
        }
    }
}

// ---------------------------------------------------------------------------
// Heading detection
// ---------------------------------------------------------------------------

/// A heading span and where its line begins.
struct Heading {
    start: usize,
    end: usize,
    line_start: usize,
}

fn headings(p: &StructurePatterns, text: &str) -> Vec<Heading> {
    p.bold
        .captures_iter(text)
        .filter_map(|caps| {
            let (whole, inner) = (caps.get(0)?, caps.get(1)?);
            if !inner.as_str().starts_with(|c: char| c.is_ascii_alphabetic()) {
                return None;
            }
            let line_start = text[..whole.start()].rfind('\n').map_or(0, |i| i + 1);
            Some(Heading {
                start: whole.start(),
                end: whole.end(),
                line_start,
            })
        })
        .collect()
}

/// Bold spans behind a list marker are list labels, and spans behind a
/// glued dash belong to the list-item repairs further down the pipeline.
fn in_list_context(p: &StructurePatterns, prefix: &str) -> bool {
    p.list_prefix.is_match(prefix) || prefix.trim_end_matches([' ', '\t']).ends_with('-')
}

// ---------------------------------------------------------------------------
// Passes 1-5: structure
// ---------------------------------------------------------------------------

/// Pass 1: drop list-item lines that have nothing after the marker.
pub(super) fn remove_dangling_bullets(p: &StructurePatterns, text: &str) -> String {
    p.dangling_bullet.replace_all(text, "").into_owned()
}

/// Pass 2: `** text **` -> `**text**`.
pub(super) fn tighten_bold(p: &StructurePatterns, text: &str) -> String {
    p.padded_bold
        .replace_all(text, |caps: &Captures| {
            let inner = caps.get(1).map_or("", |m| m.as_str());
            if inner.is_empty() {
                caps[0].to_string()
            } else {
                format!("**{inner}**")
            }
        })
        .into_owned()
}

/// Pass 3: a heading in the middle of a line starts a new paragraph.
pub(super) fn break_before_headings(p: &StructurePatterns, text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;

    for heading in headings(p, text) {
        let prefix = &text[heading.line_start..heading.start];
        if prefix.trim().is_empty() || in_list_context(p, prefix) {
            continue;
        }
        out.push_str(text[last..heading.start].trim_end_matches([' ', '\t']));
        out.push_str("\n\n");
        last = heading.start;
    }

    out.push_str(&text[last..]);
    out
}

/// Pass 4: text after a heading moves to the next line.
pub(super) fn break_after_headings(p: &StructurePatterns, text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;

    for heading in headings(p, text) {
        if in_list_context(p, &text[heading.line_start..heading.start]) {
            continue;
        }
        let rest = &text[heading.end..];
        let spaces = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        let at_line_end = matches!(rest[spaces..].chars().next(), None | Some('\n'));
        if at_line_end && spaces == 0 {
            continue;
        }

        out.push_str(&text[last..heading.end]);
        if !at_line_end {
            out.push('\n');
        }
        last = heading.end + spaces;
    }

    out.push_str(&text[last..]);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Heading,
    ListItem,
    Blank,
    Text,
}

fn line_kind(p: &StructurePatterns, line: &str) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        LineKind::Blank
    } else if p.heading_line.is_match(trimmed) {
        LineKind::Heading
    } else if p.list_item_line.is_match(trimmed) {
        LineKind::ListItem
    } else {
        LineKind::Text
    }
}

/// Pass 5: exactly two blank lines between a heading line and the heading
/// or list item before it.
pub(super) fn separate_headings(p: &StructurePatterns, text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut blanks: Vec<&str> = Vec::new();
    let mut previous = None;

    for line in text.split('\n') {
        let kind = line_kind(p, line);
        if kind == LineKind::Blank {
            blanks.push(line);
            continue;
        }
        if kind == LineKind::Heading
            && matches!(previous, Some(LineKind::Heading | LineKind::ListItem))
        {
            blanks.clear();
            lines.extend(["", ""]);
        } else {
            lines.append(&mut blanks);
        }
        lines.push(line);
        previous = Some(kind);
    }
    lines.append(&mut blanks);

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Passes 6-9: list repairs
// ---------------------------------------------------------------------------

/// Pass 6: `<label>- <Keyword>:` -> heading line plus labeled list item.
pub(super) fn split_label_keywords(label_pattern: Option<&Regex>, text: &str) -> String {
    let Some(pattern) = label_pattern else {
        return text.to_string();
    };
    pattern
        .replace_all(text, |caps: &Captures| {
            format!("**{}**\n- **{}:**", &caps["label"], &caps["keyword"])
        })
        .into_owned()
}

/// Pass 7: `sentence. - item` -> line break before the marker.
pub(super) fn break_before_glued_markers(p: &StructurePatterns, text: &str) -> String {
    p.period_dash.replace_all(text, "${1}.\n- ").into_owned()
}

/// Pass 8: `-item` at line start -> `- item`.
pub(super) fn space_list_markers(p: &StructurePatterns, text: &str) -> String {
    p.unspaced_marker.replace_all(text, "${1}- ${2}").into_owned()
}

/// Pass 9: `text- **Item**` -> line break before the bold list item.
pub(super) fn break_before_bold_items(p: &StructurePatterns, text: &str) -> String {
    p.glued_bold_item.replace_all(text, "${1}\n- **").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 10: word repairs
// ---------------------------------------------------------------------------

/// Pass 10: apply the repair dictionary in order.
pub(super) fn repair_words(repairs: &[WordRepair], text: &str) -> String {
    let mut text = text.to_string();
    for repair in repairs {
        let replaced = repair
            .pattern
            .regex
            .replace_all(&text, |caps: &Captures| {
                match_leading_case(&caps[0], &repair.replacement)
            });
        text = replaced.into_owned();
    }
    text
}

/// Uppercase the replacement's first letter if the matched text starts
/// with an uppercase letter.
fn match_leading_case(matched: &str, replacement: &str) -> String {
    let starts_upper = matched.chars().next().is_some_and(char::is_uppercase);
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) if starts_upper => first.to_uppercase().chain(chars).collect(),
        _ => replacement.to_string(),
    }
}
