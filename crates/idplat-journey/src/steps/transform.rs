//! Transform step handler (§4.2): "applies declared source-to-target
//! mappings (lowercase, uppercase, trim, split, join, replace, or a
//! whitelisted expression) over journey data and claims."

use async_trait::async_trait;
use serde_json::Value;

use idplat_core::step_handler::{StepExecutionContext, StepHandler, StepHandlerResult};
use idplat_types::prelude::*;
use idplat_types::types::DataMap;

pub struct Transform;

#[async_trait]
impl StepHandler for Transform {
	fn step_type(&self) -> &'static str {
		"transform"
	}

	async fn execute(
		&self,
		ctx: &mut StepExecutionContext<'_>,
		_cancellation: tokio_util::sync::CancellationToken,
	) -> ClResult<StepHandlerResult> {
		let Some(mappings) = ctx.step.config.get("mappings").and_then(Value::as_array) else {
			return Ok(StepHandlerResult::Fail("step_config_error".into(), "transform step missing mappings".into()));
		};

		let mut outputs = DataMap::new();
		for mapping in mappings {
			let Some(source) = mapping.get("source").and_then(Value::as_str) else { continue };
			let Some(target) = mapping.get("target").and_then(Value::as_str) else { continue };
			let op = mapping.get("op").and_then(Value::as_str).unwrap_or("identity");

			let Some(value) = ctx.journey_data.get(source).cloned() else { continue };
			let transformed = apply_op(op, &value, mapping);
			outputs.insert(target.to_string(), transformed);
		}

		Ok(StepHandlerResult::Success(outputs))
	}
}

fn apply_op(op: &str, value: &Value, mapping: &Value) -> Value {
	let as_str = value.as_str().map(str::to_string);
	match op {
		"lowercase" => as_str.map(|s| Value::from(s.to_lowercase())).unwrap_or_else(|| value.clone()),
		"uppercase" => as_str.map(|s| Value::from(s.to_uppercase())).unwrap_or_else(|| value.clone()),
		"trim" => as_str.map(|s| Value::from(s.trim().to_string())).unwrap_or_else(|| value.clone()),
		"split" => {
			let sep = mapping.get("separator").and_then(Value::as_str).unwrap_or(",");
			as_str
				.map(|s| Value::from(s.split(sep).map(str::to_string).collect::<Vec<_>>()))
				.unwrap_or_else(|| value.clone())
		}
		"join" => {
			let sep = mapping.get("separator").and_then(Value::as_str).unwrap_or(",");
			value
				.as_array()
				.map(|items| Value::from(items.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(sep)))
				.unwrap_or_else(|| value.clone())
		}
		"replace" => {
			let from = mapping.get("from").and_then(Value::as_str).unwrap_or("");
			let to = mapping.get("to").and_then(Value::as_str).unwrap_or("");
			as_str.map(|s| Value::from(s.replace(from, to))).unwrap_or_else(|| value.clone())
		}
		_ => value.clone(),
	}
}

// vim: ts=4
