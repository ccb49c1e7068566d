//! The standard extraction stages, in pipeline order

use super::patterns::{
    detect_vulnerable_line, BACKEND_DBMS, BLOCK_FIELD, PARAMETER_HEADER, QUOTED_PARAMETER,
};
use super::{ExtractionInput, ExtractionStage};
use whiterabbit_core::{Finding, Result, CRITICAL_MARKER, STDERR_LINE_PREFIX, VULNERABLE_KEYWORD};

fn has_parameter(found: &[Finding], parameter: &str) -> bool {
    found
        .iter()
        .any(|finding| finding.parameter.as_deref() == Some(parameter))
}

/// Stage 1: `Parameter: <name> (<place>)` blocks of Type/Title/Payload records.
///
/// A block runs until the first non-blank line that is not indented; blank
/// lines between records belong to the block.
pub struct InjectionBlockStage;

#[derive(Default)]
struct PendingRecord {
    category: Option<String>,
    title: Option<String>,
}

impl ExtractionStage for InjectionBlockStage {
    fn name(&self) -> &'static str {
        "injection-blocks"
    }

    fn extract(&self, input: &ExtractionInput<'_>, _found: &[Finding]) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        let mut parameter: Option<String> = None;
        let mut pending = PendingRecord::default();

        for line in input.text.lines() {
            if let Some(header) = PARAMETER_HEADER.captures(line) {
                parameter = Some(header[1].to_string());
                pending = PendingRecord::default();
                continue;
            }
            let Some(name) = parameter.as_deref() else {
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            if !line.starts_with(char::is_whitespace) {
                parameter = None;
                continue;
            }
            let Some(field) = BLOCK_FIELD.captures(line) else {
                continue;
            };
            let value = field[2].to_string();
            match &field[1] {
                "Type" => {
                    pending = PendingRecord {
                        category: Some(value),
                        title: None,
                    }
                }
                "Title" if pending.category.is_some() => pending.title = Some(value),
                "Payload" => {
                    if let (Some(category), Some(title)) =
                        (pending.category.take(), pending.title.take())
                    {
                        findings.push(Finding::injection(name, category, title, value));
                    }
                }
                _ => {}
            }
        }

        Ok(findings)
    }
}

/// Stage 2: single-line `<METHOD> parameter '<name>' is vulnerable` reports.
///
/// Only runs when no structured block was found.
pub struct VulnerableLineStage;

impl ExtractionStage for VulnerableLineStage {
    fn name(&self) -> &'static str {
        "vulnerable-lines"
    }

    fn extract(&self, input: &ExtractionInput<'_>, found: &[Finding]) -> Result<Vec<Finding>> {
        if !found.is_empty() {
            return Ok(Vec::new());
        }
        Ok(input.text.lines().filter_map(detect_vulnerable_line).collect())
    }
}

/// Stage 3: the first `back-end DBMS:` line
pub struct DbmsStage;

impl ExtractionStage for DbmsStage {
    fn name(&self) -> &'static str {
        "dbms"
    }

    fn extract(&self, input: &ExtractionInput<'_>, _found: &[Finding]) -> Result<Vec<Finding>> {
        Ok(BACKEND_DBMS
            .captures(input.text)
            .map(|captures| Finding::fact("DBMS", captures[1].trim()))
            .into_iter()
            .collect())
    }
}

/// Stage 4: critical lines that report a vulnerability.
///
/// A line naming a parameter that already has a finding adds nothing.
pub struct CriticalLineStage;

impl ExtractionStage for CriticalLineStage {
    fn name(&self) -> &'static str {
        "critical-lines"
    }

    fn extract(&self, input: &ExtractionInput<'_>, found: &[Finding]) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for line in input.critical_lines {
            if !line.contains(VULNERABLE_KEYWORD) {
                continue;
            }
            let parameter = QUOTED_PARAMETER
                .captures(line)
                .map(|captures| captures[1].to_string());
            if parameter
                .as_deref()
                .is_some_and(|name| has_parameter(found, name))
            {
                continue;
            }

            let detail = line
                .strip_prefix(STDERR_LINE_PREFIX)
                .unwrap_or(line)
                .replace(&format!("{CRITICAL_MARKER} "), "")
                .trim()
                .to_string();
            findings.push(match parameter {
                Some(name) => Finding::for_parameter(name, "CRITICAL", detail),
                None => Finding::fact("CRITICAL", detail),
            });
        }
        Ok(findings)
    }
}

/// Stage 5: findings detected while streaming, for parameters not yet covered
pub struct LiveFindingStage;

impl ExtractionStage for LiveFindingStage {
    fn name(&self) -> &'static str {
        "live-findings"
    }

    fn extract(&self, input: &ExtractionInput<'_>, found: &[Finding]) -> Result<Vec<Finding>> {
        Ok(input
            .live_findings
            .iter()
            .filter(|finding| match finding.parameter.as_deref() {
                Some(name) => !has_parameter(found, name),
                None => true,
            })
            .cloned()
            .collect())
    }
}
