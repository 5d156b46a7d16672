//! Line-oriented Markdown builder used by every report renderer.
use crate::util::found_missing;

#[derive(Debug, Default)]
pub struct MarkdownDoc {
    lines: Vec<String>,
}

impl MarkdownDoc {
    pub fn new(title: &str) -> Self {
        Self {
            lines: vec![format!("# {title}"), String::new()],
        }
    }

    pub fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn blank(&mut self) {
        if self.lines.last().is_some_and(|line| !line.is_empty()) {
            self.lines.push(String::new());
        }
    }

    pub fn section(&mut self, heading: &str) {
        self.blank();
        self.lines.push(format!("## {heading}"));
        self.lines.push(String::new());
    }

    pub fn subsection(&mut self, heading: &str) {
        self.blank();
        self.lines.push(format!("### {heading}"));
        self.lines.push(String::new());
    }

    pub fn bullet(&mut self, text: impl AsRef<str>) {
        self.lines.push(format!("- {}", text.as_ref()));
    }

    pub fn field(&mut self, label: &str, value: impl std::fmt::Display) {
        self.lines.push(format!("- {label}: {value}"));
    }

    pub fn code_field(&mut self, label: &str, value: impl std::fmt::Display) {
        self.lines.push(format!("- {label}: `{value}`"));
    }

    /// `- label: `path` (found|missing)`
    pub fn input(&mut self, label: &str, path: &str, exists: bool) {
        self.lines
            .push(format!("- {label}: `{path}` ({})", found_missing(exists)));
    }

    /// One bullet per item, or a literal `- none`.
    pub fn bullets_or_none<S: AsRef<str>>(&mut self, items: &[S]) {
        if items.is_empty() {
            self.lines.push("- none".to_string());
            return;
        }
        for item in items {
            self.bullet(item);
        }
    }

    /// Fenced block whose fence outruns any backtick run in `body`.
    pub fn fenced(&mut self, lang: &str, body: &str) {
        let body = body.trim_end();
        let fence = "`".repeat(longest_backtick_run(body).max(2) + 1);
        self.lines.push(format!("{fence}{lang}"));
        if body.is_empty() {
            self.lines.push("(empty)".to_string());
        } else {
            self.lines.push(body.to_string());
        }
        self.lines.push(fence);
    }

    pub fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) {
        self.lines.push(format!("| {} |", headers.join(" | ")));
        self.lines.push(format!(
            "|{}|",
            headers.iter().map(|_| "---").collect::<Vec<_>>().join("|")
        ));
        for row in rows {
            let cells: Vec<String> = row.iter().map(|cell| table_cell(cell)).collect();
            self.lines.push(format!("| {} |", cells.join(" | ")));
        }
    }

    pub fn finish(mut self) -> String {
        while self.lines.last().is_some_and(|line| line.is_empty()) {
            self.lines.pop();
        }
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

/// Table cells may not carry pipes or newlines.
fn longest_backtick_run(text: &str) -> usize {
    text.split(|ch| ch != '`').map(str::len).max().unwrap_or(0)
}

fn table_cell(value: &str) -> String {
    value.replace('|', "/").replace('\n', " ")
}
