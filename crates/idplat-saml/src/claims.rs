//! Resolves a `JourneyPolicy`'s `output_claims` mappings against a
//! completed journey's `journey_data`, for the `<saml:AttributeStatement>`
//! an Assertion carries (§4.6 "AttributeStatement per configured claim
//! mappings").

use serde_json::Value;

use idplat_types::types::{DataMap, OutputClaimMapping};

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
	let mut parts = path.splitn(2, '.');
	let head = parts.next()?;
	let rest = parts.next();
	let obj = value.as_object()?;
	let head_val = obj.get(head)?;
	match rest {
		None => Some(head_val.clone()),
		Some(rest) => lookup_in_value(head_val, rest),
	}
}

pub fn value_to_string(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		Value::Bool(b) => b.to_string(),
		Value::Number(n) => n.to_string(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}

/// Resolves every mapping to `(claim_name, value)`, falling back to
/// `default_value` when `source_path` is absent from `journey_data`, and
/// skipping claims with neither.
pub fn resolve_claims(journey_data: &DataMap, mappings: &[OutputClaimMapping]) -> Vec<(String, String)> {
	let mut resolved = Vec::with_capacity(mappings.len());
	for mapping in mappings {
		let value = lookup_dotted(journey_data, &mapping.source_path).or_else(|| mapping.default_value.clone());
		if let Some(value) = value {
			resolved.push((mapping.claim.clone(), value_to_string(&value)));
		}
	}
	resolved
}

// vim: ts=4
