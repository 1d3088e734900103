//! Policy validation.

use anyhow::Result;
use privgate::{AttributeBinding, Source};

use super::ConfigSource;
use crate::style::colors::SemanticStyle;
use crate::style::{print_labeled, print_spacer, print_success, print_table};

/// Loads configuration, registers every policy, and lists them.
pub fn run(source: &ConfigSource) -> Result<()> {
    let (config, registry, settings) = source.load_registry()?;

    print_labeled(
        "application",
        &config
            .application
            .id
            .as_deref()
            .map_or_else(|| "(unset)".to_string(), |id| format!("{} = {id}", config.application.attribute)),
    );
    print_labeled("source order", &settings.default_order.to_string());
    print_labeled("principal", &describe_binding(&settings.principal));
    print_labeled(
        "cache timeout",
        &settings
            .cache_timeout
            .map_or_else(|| "none".to_string(), |t| format!("{t:?}")),
    );
    print_spacer();

    if registry.is_empty() {
        println!("{}", "No policies configured.".muted());
        return Ok(());
    }

    let mut rows = Vec::new();
    for operation in registry.operations() {
        let Some(policy) = registry.get(operation) else {
            continue;
        };
        for (i, spec) in policy.specs().iter().enumerate() {
            let bindings = policy
                .bindings()
                .iter()
                .map(describe_binding)
                .collect::<Vec<_>>()
                .join("\n");
            rows.push(vec![
                if i == 0 { operation.to_string() } else { String::new() },
                spec.mode().to_string(),
                spec.source().token(),
                if i == 0 { bindings } else { String::new() },
            ]);
        }
    }
    print_table(&["Operation", "Mode", "Spec", "Bindings"], &rows);
    print_spacer();

    let count = registry.len();
    let word = if count == 1 { "policy" } else { "policies" };
    print_success(&format!("{count} {word} valid"));
    Ok(())
}

/// `name: kind <- argument:x, query:y`
fn describe_binding(binding: &AttributeBinding) -> String {
    let sources = Source::ALL
        .iter()
        .filter_map(|s| binding.source_name(*s).map(|name| format!("{s}:{name}")))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} ({:?}) <- {sources}", binding.name(), binding.kind())
}
