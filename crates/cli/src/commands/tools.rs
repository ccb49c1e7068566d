use whiterabbit_config::Config;
use whiterabbit_core::Result;

/// Print each tool profile with the arguments it starts with
pub fn execute(config: &Config) -> Result<()> {
    for (name, profile) in &config.tools {
        let marker = if *name == config.runtime.default_tool {
            " (default)"
        } else {
            ""
        };
        println!("{name}{marker}");
        println!("  {} {}", profile.program, profile.args.join(" "));
        if let Some(description) = &profile.description {
            println!("  {description}");
        }
    }
    Ok(())
}
