//! Ad-hoc spec rendering.

use anyhow::{Context, Result};
use privgate::{IdentityContext, PermissionTokenBuilder, RenderMode, RequiredPermissionSpec};

use crate::style::colors::SemanticStyle;

/// Renders `spec` against `attrs` and prints one token per line.
///
/// Values that parse as integers are treated as integers.
pub fn run(spec: &str, expression: bool, attrs: &[(String, String)]) -> Result<()> {
    let mode = if expression {
        RenderMode::Expression
    } else {
        RenderMode::Literal
    };
    let spec = RequiredPermissionSpec::new(mode, spec).context("Invalid spec")?;

    let identity = attrs
        .iter()
        .fold(IdentityContext::new("cli"), |ctx, (name, value)| match value.parse::<i64>() {
            Ok(n) => ctx.with_attribute(name.as_str(), n),
            Err(_) => ctx.with_attribute(name.as_str(), value.as_str()),
        });

    let tokens = PermissionTokenBuilder::new()
        .render(&spec, &identity)
        .context("Rendering failed")?;
    for token in tokens {
        println!("{}", token.token());
    }
    Ok(())
}
