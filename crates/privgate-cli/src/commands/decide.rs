//! Decision dry-run.

use anyhow::{Context, Result, bail};
use privgate::{
    AttributeValue, Decision, DecisionEngine, InMemoryPrivilegeCache, PrivilegeCache, Reason,
    StaticRequest,
};

use super::ConfigSource;
use crate::style::colors::SemanticStyle;
use crate::style::{print_labeled, print_spacer};

/// Request values collected from the command line.
pub struct RequestArgs {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub path: Vec<(String, String)>,
    pub args: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RequestArgs {
    fn into_request(self) -> Result<StaticRequest> {
        let mut request = StaticRequest::new();
        for (name, value) in self.headers {
            request = request.with_header(&name, value);
        }
        for (name, value) in self.query {
            request = request.with_query(name, value);
        }
        for (name, value) in self.path {
            request = request.with_path(name, value);
        }
        for (name, value) in self.args {
            request = request.with_argument(name, argument_value(value));
        }
        if let Some(body) = self.body {
            let body = serde_json::from_str(&body).context("--body is not valid JSON")?;
            request = request.with_body(body);
        }
        Ok(request)
    }
}

/// Arguments that look like integers are passed as integers.
fn argument_value(raw: String) -> AttributeValue {
    match raw.parse::<i64>() {
        Ok(n) => AttributeValue::Integer(n),
        Err(_) => AttributeValue::Text(raw),
    }
}

/// Runs one decision with `grants` loaded as the principal's privileges.
///
/// Exits with an error on Deny.
pub fn run(
    source: &ConfigSource,
    operation: &str,
    args: RequestArgs,
    grants: Vec<String>,
) -> Result<()> {
    let (_, registry, settings) = source.load_registry()?;
    let request = args.into_request()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to start runtime")?;

    let decision = runtime.block_on(async {
        let cache = InMemoryPrivilegeCache::new();
        let engine = DecisionEngine::new(cache, settings);

        // Grants belong to whoever the request resolves to
        if let Some(policy) = registry.get(operation) {
            if let Ok(identity) = engine.build_identity(&policy, &request) {
                engine
                    .cache()
                    .put(identity.principal(), grants.into_iter().collect())
                    .await?;
            }
        }

        Ok::<Decision, anyhow::Error>(engine.decide_operation(&registry, operation, &request).await)
    })?;

    print_decision(operation, &decision);

    if let Some(reason) = decision.deny_reason() {
        bail!("access denied: {reason}");
    }
    Ok(())
}

fn print_decision(operation: &str, decision: &Decision) {
    let verdict = match decision.reason() {
        Reason::Granted { .. } => "ALLOW".allow(),
        Reason::Denied(_) => "DENY".deny(),
    };
    println!("{verdict} {}", operation.header());
    print_labeled("stage", &decision.stage().to_string());

    match decision.reason() {
        Reason::Granted { token } => print_labeled("granted by", &token.token()),
        Reason::Denied(reason) => {
            print_labeled("reason", reason.code());
            print_labeled("detail", &reason.to_string());
        }
    }

    if !decision.evaluated_tokens().is_empty() {
        let tokens = decision
            .evaluated_tokens()
            .iter()
            .map(|t| t.token())
            .collect::<Vec<_>>()
            .join(", ");
        print_labeled("evaluated", &tokens);
    }
    print_spacer();
}
