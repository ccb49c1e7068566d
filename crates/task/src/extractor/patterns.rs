//! Output patterns shared by extraction, streaming and status reporting

use once_cell::sync::Lazy;
use regex::Regex;
use whiterabbit_core::{Finding, VULNERABLE_KEYWORD};

pub(super) static PARAMETER_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Parameter: (.+?) \((.+?)\)\s*$").expect("valid regex"));

pub(super) static BLOCK_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+(Type|Title|Payload): (.+?)\s*$").expect("valid regex"));

static VULNERABLE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\w+) parameter '(.+?)' (is vulnerable.*?)\s*$").expect("valid regex")
});

pub(super) static QUOTED_PARAMETER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"parameter '(.+?)'").expect("valid regex"));

pub(super) static BACKEND_DBMS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)back-end DBMS: (.+?)\s*$").expect("valid regex"));

static ERROR_MARKER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[ERROR\] (.+)").expect("valid regex"));

const SUMMARY_HEADER: &str = "identified the following injection point(s)";
const SECTION_DELIMITER: &str = "---";

/// Parse a `<METHOD> parameter '<name>' is vulnerable...` line.
///
/// The category is `<METHOD> - <details>` and the detail is the text from
/// `is vulnerable` to the end of the line.
pub fn detect_vulnerable_line(line: &str) -> Option<Finding> {
    if !line.contains(VULNERABLE_KEYWORD) {
        return None;
    }
    let captures = VULNERABLE_LINE.captures(line)?;
    let method = &captures[1];
    let parameter = &captures[2];
    let details = &captures[3];
    Some(Finding::for_parameter(
        parameter,
        format!("{method} - {details}"),
        details,
    ))
}

/// The injection point section of a finished scan, if the scanner printed one
pub fn injection_summary(text: &str) -> Option<String> {
    let mut lines = text.lines().skip_while(|line| !line.contains(SUMMARY_HEADER));
    lines.next()?;

    let mut section = Vec::new();
    let mut lines = lines.peekable();
    if lines.peek().map(|l| l.trim()) == Some(SECTION_DELIMITER) {
        lines.next();
        for line in lines {
            if line.trim() == SECTION_DELIMITER {
                break;
            }
            section.push(line);
        }
    } else {
        section.extend(lines.take_while(|line| !line.trim().is_empty()));
    }

    let summary = section.join("\n").trim().to_string();
    (!summary.is_empty()).then_some(summary)
}

/// Message of the first `[ERROR] ...` line in the output
pub fn first_error_marker(text: &str) -> Option<String> {
    ERROR_MARKER_LINE
        .captures(text)
        .map(|captures| captures[1].trim().to_string())
}
