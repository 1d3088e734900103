//! Configuration commands.

use anyhow::Result;

use super::ConfigSource;
use crate::style::colors::SemanticStyle;

/// Show the effective configuration.
pub fn show(source: &ConfigSource, format: &str) -> Result<()> {
    let config = source.load()?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        "toml" => {
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{toml_str}");
        }
        _ => {
            println!("{}", "privgate Configuration".header());
            println!("======================\n");

            println!("Application:");
            println!(
                "  Id: {}",
                config.application.id.as_deref().unwrap_or("None")
            );
            println!("  Attribute: {}", config.application.attribute);
            println!();

            println!("Resolution:");
            println!("  Order: {}", config.resolution.order);
            let principal = &config.resolution.principal;
            for (label, name) in [
                ("argument", &principal.argument),
                ("query", &principal.query),
                ("path", &principal.path),
                ("body", &principal.body),
                ("header", &principal.header),
            ] {
                if let Some(name) = name {
                    println!("  Principal {label}: {name}");
                }
            }
            println!();

            println!("Cache:");
            println!(
                "  Timeout: {}",
                config
                    .cache
                    .timeout_ms
                    .map_or("None".to_string(), |ms| format!("{ms}ms"))
            );
            println!();

            println!("Policies: {}", config.policies.len());
            for policy in &config.policies {
                println!("  {}", policy.operation.token());
            }
        }
    }

    Ok(())
}
