//! Resolution of a scan request into a concrete invocation

use std::fmt;
use whiterabbit_config::ToolProfile;
use whiterabbit_core::ScanOptions;

/// A fully resolved scanner invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ScanCommand {
    /// Build the invocation for `target`: profile arguments first, then one
    /// argument per enabled option in submission order.
    ///
    /// `true` options become `--name`, `false` options are omitted and every
    /// other value becomes `--name=value`.
    pub fn resolve(profile: &ToolProfile, target: &str, options: &ScanOptions) -> Self {
        let mut args = profile.leading_args(target);
        args.extend(
            options
                .iter()
                .filter_map(|(name, value)| value.to_arg(name)),
        );
        Self {
            program: profile.program.clone(),
            args,
        }
    }

    /// The invocation as a single display string
    pub fn command_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ScanCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
