//! Dispatch an event from the command line

use crate::cli::OutputFormat;
use crate::engine::Engine;
use crate::output;
use anyhow::{Context, Result};
use hearken_core::{InvocationOutcome, ListenerEvent};

pub fn parse_payload(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).context("payload is not valid JSON")
}

/// Run every active listener for `event_type`; fails if any invocation did
pub async fn execute(
    engine: &Engine,
    event_type: String,
    payload: &str,
    format: OutputFormat,
) -> Result<Vec<InvocationOutcome>> {
    let event = ListenerEvent::new(event_type, parse_payload(payload)?);
    let outcomes = engine.runner.dispatch(event.clone()).await;
    output::outcomes(&event.event_type, &outcomes, format)?;

    let failed = outcomes.iter().filter(|o| !o.status.is_success()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} listeners did not succeed", failed, outcomes.len());
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_payload(r#"{"key":"HK-1"}"#).unwrap(), json!({"key": "HK-1"}));
        assert!(parse_payload("{not json").is_err());
    }
}
