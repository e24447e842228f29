//! Condition Evaluator: boolety predicate evaluation over journey context,
//! used both for policy matching (`JourneyPolicy::matches`) and for a
//! `PolicyStep`'s pre-conditions (§4.1 step 1 "evaluates each step's
//! pre-conditions through the condition evaluator").
//!
//! Grounded on the teacher's ABAC `Condition`/`Operator` pattern
//! (`server/src/core/abac.rs`), generalized from subject/object attribute
//! lookup to lookup over a journey's `journey_data` + match context.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{DataMap, JourneyType, TnId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
	Equals,
	NotEquals,
	Contains,
	NotContains,
	GreaterThan,
	LessThan,
	In,
	Exists,
}

/// The context a `JourneyPolicy` is matched against when the orchestrator's
/// `start` selects a policy via `(tenant_id, client_id, type, scopes,
/// acr_values, additional_parameters)` (§3).
#[derive(Clone, Debug)]
pub struct MatchContext {
	pub tenant_id: Option<TnId>,
	pub client_id: String,
	pub journey_type: JourneyType,
	pub scopes: Vec<String>,
	pub acr_values: Vec<String>,
	pub additional_parameters: DataMap,
}

impl MatchContext {
	fn lookup(&self, attribute: &str) -> Option<Value> {
		match attribute {
			"tenant_id" => self.tenant_id.map(|t| Value::from(t.0)),
			"client_id" => Some(Value::from(self.client_id.clone())),
			"scopes" => Some(Value::from(self.scopes.clone())),
			"acr_values" => Some(Value::from(self.acr_values.clone())),
			other => other
				.strip_prefix("param.")
				.and_then(|key| self.additional_parameters.get(key).cloned()),
		}
	}
}

/// Evaluate `journey_data` (e.g. `user.mfa_enabled` from §8 scenario 3)
/// against a single condition.
pub fn evaluate_journey_data(attribute: &str, operator: Operator, value: &Value, data: &DataMap) -> bool {
	let actual = lookup_dotted(data, attribute);
	compare(actual.as_ref(), operator, value)
}

/// Evaluate a policy match-condition against a `MatchContext`.
pub fn evaluate(attribute: &str, operator: Operator, value: &Value, ctx: &MatchContext) -> bool {
	let actual = ctx.lookup(attribute);
	compare(actual.as_ref(), operator, value)
}

fn lookup_dotted(data: &DataMap, path: &str) -> Option<Value> {
	let mut parts = path.splitn(2, '.');
	let head = parts.next()?;
	let rest = parts.next();
	let head_val = data.get(head)?;
	match rest {
		None => Some(head_val.clone()),
		Some(rest) => lookup_in_value(head_val, rest),
	}
}

fn lookup_in_value(value: &Value, path: &str) -> Option<Value> {
	let mut cur = value;
	for part in path.split('.') {
		cur = cur.get(part)?;
	}
	Some(cur.clone())
}

fn compare(actual: Option<&Value>, operator: Operator, expected: &Value) -> bool {
	match operator {
		Operator::Exists => actual.is_some(),
		_ => {
			let Some(actual) = actual else { return false };
			match operator {
				Operator::Equals => actual == expected,
				Operator::NotEquals => actual != expected,
				Operator::Contains => match actual {
					Value::Array(items) => items.contains(expected),
					Value::String(s) => expected.as_str().is_some_and(|e| s.contains(e)),
					_ => false,
				},
				Operator::NotContains => !matches!(
					(actual, expected.as_str()),
					(Value::Array(items), _) if items.contains(expected)
				) && !matches!(
					(actual, expected.as_str()),
					(Value::String(s), Some(e)) if s.contains(e)
				),
				Operator::GreaterThan => numeric(actual)
					.zip(numeric(expected))
					.is_some_and(|(a, b)| a > b),
				Operator::LessThan => numeric(actual)
					.zip(numeric(expected))
					.is_some_and(|(a, b)| a < b),
				Operator::In => match expected {
					Value::Array(items) => items.contains(actual),
					_ => false,
				},
				Operator::Exists => unreachable!(),
			}
		}
	}
}

fn numeric(v: &Value) -> Option<f64> {
	v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn equals_on_nested_journey_data() {
		let mut data = DataMap::new();
		data.insert("user".into(), json!({"mfa_enabled": true}));
		assert!(evaluate_journey_data("user.mfa_enabled", Operator::Equals, &json!(true), &data));
		assert!(!evaluate_journey_data("user.mfa_enabled", Operator::Equals, &json!(false), &data));
	}

	#[test]
	fn missing_attribute_is_false_except_for_exists() {
		let data = DataMap::new();
		assert!(!evaluate_journey_data("user.mfa_enabled", Operator::Equals, &json!(true), &data));
		assert!(!evaluate_journey_data("user.mfa_enabled", Operator::Exists, &Value::Null, &data));
	}

	#[test]
	fn policy_match_context() {
		let ctx = MatchContext {
			tenant_id: Some(TnId(1)),
			client_id: "demo-client".into(),
			journey_type: JourneyType::SignIn,
			scopes: vec!["openid".into(), "profile".into()],
			acr_values: vec![],
			additional_parameters: DataMap::new(),
		};
		assert!(evaluate("scopes", Operator::Contains, &json!("profile"), &ctx));
		assert!(!evaluate("scopes", Operator::Contains, &json!("email"), &ctx));
		assert!(evaluate("client_id", Operator::Equals, &json!("demo-client"), &ctx));
	}
}

// vim: ts=4
