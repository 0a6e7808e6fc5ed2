//! Markdown to styled terminal lines
//!
//! Covers what chat replies actually use: headings, bullet and numbered
//! lists, fenced code blocks, horizontal rules, and inline `code`, **bold**
//! and *italic*. Anything else (tables included) renders as plain text.

use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};

#[derive(Debug, Clone, Copy)]
pub struct MarkdownStyles {
    pub text: Style,
    pub heading: Style,
    pub code: Style,
    pub bullet: Style,
    pub rule: Style,
}

pub fn render_markdown(text: &str, styles: &MarkdownStyles) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut in_code_block = false;

    for raw in text.lines() {
        let trimmed = raw.trim_start();

        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }

        if in_code_block {
            lines.push(Line::from(Span::styled(format!("  {}", raw), styles.code)));
            continue;
        }

        if let Some((level, heading)) = parse_heading(trimmed) {
            let style = if level <= 2 {
                styles.heading.add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                styles.heading.add_modifier(Modifier::BOLD)
            };
            lines.push(Line::from(Span::styled(heading.to_string(), style)));
            continue;
        }

        if is_rule(trimmed) {
            lines.push(Line::from(Span::styled("─".repeat(24), styles.rule)));
            continue;
        }

        let indent = " ".repeat(raw.len() - trimmed.len());
        if let Some(item) = strip_bullet(trimmed) {
            let mut spans = vec![Span::styled(format!("{}  • ", indent), styles.bullet)];
            spans.extend(parse_inline(item, styles));
            lines.push(Line::from(spans));
            continue;
        }

        if let Some((number, item)) = split_numbered(trimmed) {
            let mut spans = vec![Span::styled(format!("{}  {}. ", indent, number), styles.bullet)];
            spans.extend(parse_inline(item, styles));
            lines.push(Line::from(spans));
            continue;
        }

        let spans = parse_inline(raw, styles);
        if spans.is_empty() {
            lines.push(Line::default());
        } else {
            lines.push(Line::from(spans));
        }
    }

    lines
}

fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &line[level..];
    if rest.is_empty() {
        return Some((level, ""));
    }
    rest.strip_prefix(' ').map(|heading| (level, heading.trim()))
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ["-", "*", "_"]
            .iter()
            .any(|marker| compact.chars().all(|c| c.to_string() == *marker))
}

fn strip_bullet(line: &str) -> Option<&str> {
    ["- ", "* ", "+ "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
}

fn split_numbered(line: &str) -> Option<(&str, &str)> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 3 {
        return None;
    }
    line[digits..]
        .strip_prefix(". ")
        .map(|item| (&line[..digits], item))
}

/// Parse inline `code`, **bold** and *italic* into styled spans
fn parse_inline(text: &str, styles: &MarkdownStyles) -> Vec<Span<'static>> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current_text = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '`' {
            if let Some(end) = find(&chars, i + 1, &['`']) {
                flush(&mut spans, &mut current_text, styles.text);
                spans.push(Span::styled(collect(&chars[i + 1..end]), styles.code));
                i = end + 1;
                continue;
            }
        } else if c == '*' && chars.get(i + 1) == Some(&'*') {
            match find(&chars, i + 2, &['*', '*']) {
                Some(end) if end > i + 2 => {
                    flush(&mut spans, &mut current_text, styles.text);
                    spans.push(Span::styled(
                        collect(&chars[i + 2..end]),
                        styles.text.add_modifier(Modifier::BOLD),
                    ));
                    i = end + 2;
                }
                // No closing **, treat as literal
                _ => {
                    current_text.push_str("**");
                    i += 2;
                }
            }
            continue;
        } else if c == '*' && chars.get(i + 1).map_or(false, |n| !n.is_whitespace()) {
            if let Some(end) = find_italic_close(&chars, i + 1) {
                flush(&mut spans, &mut current_text, styles.text);
                spans.push(Span::styled(
                    collect(&chars[i + 1..end]),
                    styles.text.add_modifier(Modifier::ITALIC),
                ));
                i = end + 1;
                continue;
            }
        }

        current_text.push(c);
        i += 1;
    }

    flush(&mut spans, &mut current_text, styles.text);
    spans
}

fn find(chars: &[char], start: usize, pattern: &[char]) -> Option<usize> {
    if start > chars.len() {
        return None;
    }
    chars[start..]
        .windows(pattern.len())
        .position(|window| window == pattern)
        .map(|offset| start + offset)
}

/// Closing `*` for italic text: one that follows a non-space character
fn find_italic_close(chars: &[char], start: usize) -> Option<usize> {
    (start + 1..chars.len()).find(|&j| chars[j] == '*' && !chars[j - 1].is_whitespace())
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect()
}

fn flush(spans: &mut Vec<Span<'static>>, current_text: &mut String, style: Style) {
    if !current_text.is_empty() {
        spans.push(Span::styled(std::mem::take(current_text), style));
    }
}
