//! Natural-language prompt parsing for the network scanner
//!
//! Phrases are matched against an explicit ordered table; nothing here runs a
//! scan.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Phrase to network scanner argument table, in matching order
pub const KEYWORD_FLAGS: &[(&str, &str)] = &[
    ("no ping", "-Pn"),
    ("skip ping", "-Pn"),
    ("version", "-sV"),
    ("service detection", "-sV"),
    ("os detection", "-O"),
    ("aggressive", "-A"),
    ("verbose", "-v"),
    ("top ports", "--top-ports 100"),
    ("udp", "-sU"),
    ("quick", "-T4"),
];

static IPV4_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("valid regex"));

static PORT_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ports?\s*(\d{1,5}(?:\s*,\s*\d{1,5})*)").expect("valid regex")
});

/// Scanner options derived from a prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PromptOptions {
    /// First IPv4 address in the prompt
    pub target: Option<String>,
    /// Comma-separated port list without spaces
    pub ports: Option<String>,
    /// Scanner arguments, deduplicated, in table order
    pub flags: Vec<String>,
}

impl PromptOptions {
    /// Arguments for the scanner: target, then `-p <ports>`, then flags
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(target) = &self.target {
            args.push(target.clone());
        }
        if let Some(ports) = &self.ports {
            args.push("-p".to_string());
            args.push(ports.clone());
        }
        args.extend(self.flags.iter().cloned());
        args
    }
}

/// Parse a free-form prompt such as `"quick scan of 10.0.0.5 ports 22, 80 with no ping"`
pub fn parse_prompt(prompt: &str) -> PromptOptions {
    let prompt = prompt.to_lowercase();

    let target = IPV4_TARGET
        .find(&prompt)
        .map(|m| m.as_str().to_string());
    let ports = PORT_LIST
        .captures(&prompt)
        .map(|captures| captures[1].split_whitespace().collect::<String>());

    let mut flags: Vec<String> = Vec::new();
    for (phrase, option) in KEYWORD_FLAGS {
        if !prompt.contains(phrase) {
            continue;
        }
        for arg in option.split_whitespace() {
            if arg.starts_with('-') && flags.iter().any(|existing| existing == arg) {
                continue;
            }
            flags.push(arg.to_string());
        }
    }

    PromptOptions {
        target,
        ports,
        flags,
    }
}
