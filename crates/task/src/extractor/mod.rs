//! Structured findings from raw scanner output
//!
//! Extraction is a fixed sequence of stages over the accumulated output.
//! Each stage sees what earlier stages already found, and a finding whose key
//! was produced by an earlier stage is dropped, so the earliest stage wins.

mod patterns;
mod stages;

pub use self::patterns::{detect_vulnerable_line, first_error_marker, injection_summary};
pub use self::stages::{
    CriticalLineStage, DbmsStage, InjectionBlockStage, LiveFindingStage, VulnerableLineStage,
};

use std::collections::HashSet;
use whiterabbit_core::{Error, Finding, Result};

/// Everything extraction reads from a finished task
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    /// Buffered output joined with newlines
    pub text: &'a str,
    /// Lines tagged with the critical marker
    pub critical_lines: &'a [String],
    /// Findings detected while the scan was streaming
    pub live_findings: &'a [Finding],
}

/// One step of the extraction pipeline
pub trait ExtractionStage: Send + Sync {
    /// Stage name used in error messages
    fn name(&self) -> &'static str;

    /// Produce candidate findings; `found` holds the results of earlier stages
    fn extract(&self, input: &ExtractionInput<'_>, found: &[Finding]) -> Result<Vec<Finding>>;
}

/// Ordered pipeline of extraction stages
pub struct OutputExtractor {
    stages: Vec<Box<dyn ExtractionStage>>,
}

impl OutputExtractor {
    /// The standard five-stage pipeline
    pub fn new() -> Self {
        Self::with_stages(vec![
            Box::new(InjectionBlockStage),
            Box::new(VulnerableLineStage),
            Box::new(DbmsStage),
            Box::new(CriticalLineStage),
            Box::new(LiveFindingStage),
        ])
    }

    /// A pipeline with custom stages, run in the given order
    pub fn with_stages(stages: Vec<Box<dyn ExtractionStage>>) -> Self {
        Self { stages }
    }

    /// Names of the configured stages in execution order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run every stage and return the deduplicated findings in stage order.
    ///
    /// The input is only read, so repeated runs over the same input give the
    /// same result.
    pub fn extract(&self, input: &ExtractionInput<'_>) -> Result<Vec<Finding>> {
        let mut findings: Vec<Finding> = Vec::new();
        let mut seen = HashSet::new();

        for stage in &self.stages {
            let candidates = stage.extract(input, &findings).map_err(|e| {
                Error::extraction(format!("stage '{}' failed: {e}", stage.name()))
            })?;
            for finding in candidates {
                if seen.insert(finding.key()) {
                    findings.push(finding);
                }
            }
        }

        Ok(findings)
    }
}

impl Default for OutputExtractor {
    fn default() -> Self {
        Self::new()
    }
}
