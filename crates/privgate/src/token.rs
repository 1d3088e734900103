//! Rendering required-permission specs into concrete privilege tokens.

use std::collections::HashSet;

use tracing::trace;

use crate::attributes::IdentityContext;
use crate::error::RenderError;
use crate::policy::{Compiled, RequiredPermissionSpec};

/// Turns specs into the tokens a principal must hold.
///
/// Rendering is a pure function of the spec and the identity context: the
/// same inputs always produce the same tokens, in the same order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionTokenBuilder;

impl PermissionTokenBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Renders one spec. Expressions may yield several tokens.
    pub fn render(
        &self,
        spec: &RequiredPermissionSpec,
        identity: &IdentityContext,
    ) -> Result<Vec<String>, RenderError> {
        let tokens = match &spec.compiled {
            Compiled::Literal(template) => vec![template.render(identity)?],
            Compiled::Expression(expression) => expression.render(identity)?,
        };
        trace!(spec = spec.source(), ?tokens, "rendered");
        Ok(tokens)
    }

    /// Renders every spec, preserving declaration order and dropping duplicates.
    pub fn render_all<'a>(
        &self,
        specs: impl IntoIterator<Item = &'a RequiredPermissionSpec>,
        identity: &IdentityContext,
    ) -> Result<Vec<String>, RenderError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for spec in specs {
            for token in self.render(spec, identity)? {
                if seen.insert(token.clone()) {
                    out.push(token);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> IdentityContext {
        IdentityContext::new("u1")
            .with_attribute("appId", "1")
            .with_attribute("unitId", 5_i64)
    }

    #[test]
    fn test_literal_and_expression_agree() {
        let builder = PermissionTokenBuilder::new();
        let literal = RequiredPermissionSpec::literal("APP{appId}_UNIT{unitId}_READ").unwrap();
        let expression =
            RequiredPermissionSpec::expression("'APP' + #appId + '_UNIT' + #unitId + '_READ'")
                .unwrap();

        assert_eq!(
            builder.render(&literal, &ctx()).unwrap(),
            builder.render(&expression, &ctx()).unwrap()
        );
    }

    #[test]
    fn test_render_all_dedupes_in_order() {
        let specs = [
            RequiredPermissionSpec::literal("B{unitId}").unwrap(),
            RequiredPermissionSpec::expression("'A', 'B' + #unitId").unwrap(),
        ];
        let tokens = PermissionTokenBuilder::new()
            .render_all(&specs, &ctx())
            .unwrap();
        assert_eq!(tokens, vec!["B5".to_string(), "A".to_string()]);
    }

    #[test]
    fn test_missing_attribute_propagates() {
        let spec = RequiredPermissionSpec::literal("UNIT{other}").unwrap();
        let err = PermissionTokenBuilder::new()
            .render(&spec, &ctx())
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::MissingContext {
                attribute: "other".to_string()
            }
        );
    }
}
