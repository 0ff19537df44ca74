use std::sync::LazyLock;

use regex::Regex;

/// rustc `--error-format=short`: `path:LINE:COL: level[CODE]: message`
static SHORT_DIAGNOSTIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[^:\n]*):(?P<line>\d+):(?P<col>\d+): (?P<level>error|warning|note|help)(?:\[(?P<code>[A-Za-z0-9_-]+)\])?: (?P<msg>.*)$",
    )
    .expect("valid diagnostic regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
    Note,
    Help,
}

impl Level {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "error" => Some(Level::Error),
            "warning" => Some(Level::Warning),
            "note" => Some(Level::Note),
            "help" => Some(Level::Help),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Note => "note",
            Level::Help => "help",
        }
    }
}

/// One compiler message pinned to a 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub code: Option<String>,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl Diagnostic {
    pub fn summary(&self) -> String {
        let code = self
            .code
            .as_ref()
            .map(|c| format!("[{c}]"))
            .unwrap_or_default();
        format!(
            "{}:{} {}{code}: {}",
            self.line,
            self.column,
            self.level.label(),
            self.message
        )
    }
}

/// Pull every located diagnostic out of compiler output. Other lines are skipped.
pub fn parse_diagnostics(output: &str) -> Vec<Diagnostic> {
    output
        .lines()
        .filter_map(|line| {
            let caps = SHORT_DIAGNOSTIC_RE.captures(line.trim_end())?;
            Some(Diagnostic {
                level: Level::parse(&caps["level"])?,
                code: caps.name("code").map(|m| m.as_str().to_string()),
                message: caps["msg"].to_string(),
                line: caps["line"].parse().ok()?,
                column: caps["col"].parse().ok()?,
            })
        })
        .collect()
}
