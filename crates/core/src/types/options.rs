//! Scan options supplied at submission time
//!
//! Options are kept in insertion order because they are echoed verbatim into
//! the scanner's command line, and the recorded command line must be
//! reproducible.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered mapping of option name to value
pub type ScanOptions = IndexMap<String, OptionValue>;

/// Value of a single scan option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Bare flag, emitted only when `true`
    Flag(bool),
    /// Whole number
    Integer(i64),
    /// Fractional number
    Float(f64),
    /// Free-form text
    Text(String),
}

impl OptionValue {
    /// Render the option as a single command-line argument.
    ///
    /// `true` becomes `--name`, `false` is dropped, every other value becomes
    /// `--name=value`.
    pub fn to_arg(&self, name: &str) -> Option<String> {
        match self {
            OptionValue::Flag(true) => Some(format!("--{name}")),
            OptionValue::Flag(false) => None,
            other => Some(format!("--{name}={other}")),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Flag(value) => write!(f, "{value}"),
            OptionValue::Integer(value) => write!(f, "{value}"),
            OptionValue::Float(value) => write!(f, "{value}"),
            OptionValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Flag(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Integer(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

/// Convert a command-line style argument list into ordered options.
///
/// `--name value` pairs become text options, a `--name` not followed by a
/// value becomes a `true` flag, and anything not starting with `--` outside a
/// pair is ignored.
pub fn options_from_args<S: AsRef<str>>(args: &[S]) -> ScanOptions {
    let mut options = ScanOptions::new();
    let mut i = 0;

    while i < args.len() {
        let arg = args[i].as_ref();
        match arg.strip_prefix("--") {
            Some(name) if !name.is_empty() => {
                let value = args
                    .get(i + 1)
                    .map(AsRef::as_ref)
                    .filter(|next| !next.starts_with("--"));
                match value {
                    Some(value) => {
                        options.insert(name.to_string(), OptionValue::from(value));
                        i += 2;
                    }
                    None => {
                        options.insert(name.to_string(), OptionValue::Flag(true));
                        i += 1;
                    }
                }
            }
            _ => i += 1,
        }
    }

    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_rendering() {
        assert_eq!(
            OptionValue::Integer(3).to_arg("level").as_deref(),
            Some("--level=3")
        );
        assert_eq!(
            OptionValue::Flag(true).to_arg("flush-session").as_deref(),
            Some("--flush-session")
        );
        assert_eq!(OptionValue::Flag(false).to_arg("forms"), None);
        assert_eq!(
            OptionValue::from("id=1").to_arg("data").as_deref(),
            Some("--data=id=1")
        );
        assert_eq!(
            OptionValue::Float(0.5).to_arg("delay").as_deref(),
            Some("--delay=0.5")
        );
    }

    #[test]
    fn test_options_deserialize_from_json_values() {
        let options: ScanOptions =
            serde_json::from_str(r#"{"level": 3, "risk": 2.5, "forms": true, "data": "id=1"}"#)
                .unwrap();

        let keys: Vec<&str> = options.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["level", "risk", "forms", "data"]);
        assert_eq!(options["level"], OptionValue::Integer(3));
        assert_eq!(options["risk"], OptionValue::Float(2.5));
        assert_eq!(options["forms"], OptionValue::Flag(true));
        assert_eq!(options["data"], OptionValue::Text("id=1".to_string()));
    }

    #[test]
    fn test_options_from_args_pairs_and_flags() {
        let args = ["--data", "id=1", "--flush-session", "--level", "3", "stray"];
        let options = options_from_args(&args);

        let keys: Vec<&str> = options.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["data", "flush-session", "level"]);
        assert_eq!(options["data"], OptionValue::Text("id=1".to_string()));
        assert_eq!(options["flush-session"], OptionValue::Flag(true));
        assert_eq!(options["level"], OptionValue::Text("3".to_string()));
    }

    #[test]
    fn test_trailing_flag_without_value() {
        let options = options_from_args(&["--batch"]);
        assert_eq!(options["batch"], OptionValue::Flag(true));
    }

    proptest::proptest! {
        #[test]
        fn test_args_keep_submission_order(
            names in proptest::collection::vec("[a-z][a-z-]{0,8}", 1..12),
        ) {
            let mut unique = Vec::new();
            for name in names {
                if !unique.contains(&name) {
                    unique.push(name);
                }
            }
            let args: Vec<String> = unique
                .iter()
                .flat_map(|name| [format!("--{name}"), "1".to_string()])
                .collect();

            let options = options_from_args(&args);
            let keys: Vec<&String> = options.keys().collect();
            proptest::prop_assert_eq!(keys, unique.iter().collect::<Vec<_>>());

            let rendered: Vec<String> = options
                .iter()
                .filter_map(|(name, value)| value.to_arg(name))
                .collect();
            let expected: Vec<String> = unique.iter().map(|name| format!("--{name}=1")).collect();
            proptest::prop_assert_eq!(rendered, expected);
        }
    }
}
