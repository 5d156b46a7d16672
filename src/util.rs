use chrono::{SecondsFormat, Utc};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Timestamp used for every `generated_at` field in one invocation.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

pub fn resolve_path(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

/// Drop repeated entries, keeping the first occurrence of each.
pub fn dedupe<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values {
        let value = value.into();
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

pub fn found_missing(exists: bool) -> &'static str {
    if exists {
        "found"
    } else {
        "missing"
    }
}

/// Last `count` lines of `text`, with trailing whitespace removed.
pub fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

pub fn head_lines(text: &str, count: usize) -> String {
    text.lines().take(count).collect::<Vec<_>>().join("\n")
}

/// First capture group of `re` in `text`, trimmed; `None` when empty.
pub fn capture_first(re: &Regex, text: &str) -> Option<String> {
    let value = re.captures(text)?.get(1)?.as_str().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Value of a `- <label>: value` bullet anywhere in `text`.
pub fn labeled_value(text: &str, label: &str) -> Option<String> {
    let pattern = format!(r"(?m)^\s*-\s*{}:[ \t]*([^\n]*)$", regex::escape(label));
    let re = Regex::new(&pattern).ok()?;
    capture_first(&re, text)
}

/// Labeled value with surrounding backticks removed.
pub fn labeled_code_value(text: &str, label: &str) -> Option<String> {
    labeled_value(text, label).map(|value| value.trim_matches('`').trim().to_string())
}

pub fn labeled_count(text: &str, label: &str) -> Option<u32> {
    labeled_value(text, label).and_then(|value| parse_leading_u32(&value))
}

fn parse_leading_u32(value: &str) -> Option<u32> {
    let digits: String = value
        .trim_matches('`')
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Backtick count of a fence line (three or more), with the text after it.
fn fence_open(line: &str) -> Option<(usize, &str)> {
    let line = line.trim();
    let ticks = line.chars().take_while(|ch| *ch == '`').count();
    if ticks >= 3 {
        Some((ticks, &line[ticks..]))
    } else {
        None
    }
}

fn closes_fence(line: &str, open: usize) -> bool {
    fence_open(line).is_some_and(|(ticks, rest)| ticks >= open && rest.is_empty())
}

/// Markdown body between `heading` and the next heading of the same or higher level.
/// Lines inside fenced blocks never end the section.
pub fn section_body<'a>(text: &'a str, heading: &str) -> Option<&'a str> {
    let level = heading.chars().take_while(|ch| *ch == '#').count();
    let mut offset = 0;
    let mut start = None;
    let mut fence: Option<usize> = None;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if let Some(open) = fence {
            if closes_fence(trimmed, open) {
                fence = None;
            }
            offset += line.len();
            continue;
        }
        if let Some((ticks, _)) = fence_open(trimmed) {
            fence = Some(ticks);
            offset += line.len();
            continue;
        }
        if let Some(body_start) = start {
            let hashes = trimmed.chars().take_while(|ch| *ch == '#').count();
            if hashes > 0 && hashes <= level && trimmed[hashes..].starts_with(' ') {
                return Some(&text[body_start..offset]);
            }
        } else if trimmed == heading {
            start = Some(offset + line.len());
        }
        offset += line.len();
    }
    start.map(|body_start| &text[body_start..])
}

/// Contents of the first fenced code block in `text`.
pub fn first_fenced_block(text: &str) -> Option<String> {
    let mut lines = text.lines();
    let open = lines.by_ref().find_map(|line| fence_open(line).map(|(ticks, _)| ticks))?;
    let mut body = Vec::new();
    for line in lines {
        if closes_fence(line, open) {
            return Some(body.join("\n"));
        }
        body.push(line);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_keeps_first_seen_order() {
        let values = dedupe(["b", "a", "b", "c", "a"]);
        assert_eq!(values, vec!["b", "a", "c"]);
    }

    #[test]
    fn labeled_value_reads_bullet_lines() {
        let text = "# Title\n- verdict: READY\n- target_repo: `acme/app`\n";
        assert_eq!(labeled_value(text, "verdict").as_deref(), Some("READY"));
        assert_eq!(
            labeled_code_value(text, "target_repo").as_deref(),
            Some("acme/app")
        );
        assert_eq!(labeled_value(text, "missing"), None);
    }

    #[test]
    fn labeled_value_treats_blank_values_as_absent() {
        assert_eq!(labeled_value("- verdict:\n- other: x\n", "verdict"), None);
    }

    #[test]
    fn labeled_count_ignores_trailing_text() {
        let text = "- startup_failure_runs: 3 (of 20)\n- jobs.total_count: `0`\n";
        assert_eq!(labeled_count(text, "startup_failure_runs"), Some(3));
        assert_eq!(labeled_count(text, "jobs.total_count"), Some(0));
        assert_eq!(labeled_count("- runs: unknown\n", "runs"), None);
    }

    #[test]
    fn section_body_stops_at_next_heading() {
        let text = "# T\n\n## A\nalpha\n### A1\nnested\n## B\nbeta\n";
        assert_eq!(section_body(text, "## A"), Some("alpha\n### A1\nnested\n"));
        assert_eq!(section_body(text, "## B"), Some("beta\n"));
        assert_eq!(section_body(text, "## C"), None);
    }

    #[test]
    fn tail_lines_keeps_last_entries() {
        assert_eq!(tail_lines("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail_lines("a\n", 5), "a");
    }

    #[test]
    fn first_fenced_block_requires_closing_fence() {
        assert_eq!(
            first_fenced_block("x\n```text\none\ntwo\n```\n").as_deref(),
            Some("one\ntwo")
        );
        assert_eq!(first_fenced_block("```text\nopen"), None);
    }

    #[test]
    fn fenced_output_does_not_end_a_section() {
        let text = "## Raw Output\n````text\n## looks like a heading\n```\n````\n## Next\nx\n";
        assert_eq!(
            section_body(text, "## Raw Output"),
            Some("````text\n## looks like a heading\n```\n````\n")
        );
        assert_eq!(
            first_fenced_block(text).as_deref(),
            Some("## looks like a heading\n```")
        );
    }
}
