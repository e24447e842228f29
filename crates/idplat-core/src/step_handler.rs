//! Step Handler Registry and contract (§2, §4.2, §9 "Polymorphic step
//! handlers. Implement as a registry mapping step_type -> a capability
//! object with a single execute operation; use a tagged variant for
//! StepHandlerResult with the six outcomes").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use idplat_types::prelude::*;
use idplat_types::types::{Client, DataMap, PolicyStep, TnId};

use crate::app::App;

/// The six tagged outcomes a step handler may report (§4.1 "Execution
/// loop").
#[derive(Debug)]
pub enum StepHandlerResult {
	Success(DataMap),
	Fail(String, String),
	RequireInput(String, Value),
	Skip,
	Branch(String),
	Complete,
}

/// Execution context handed to a step handler: read/write access to
/// journey data, read-only user input, the step's configuration, the
/// resolved tenant/client, and the `App` capability bundle (stores,
/// messaging, events, HTTP callouts are all reachable through `app`).
pub struct StepExecutionContext<'a> {
	pub app: &'a App,
	pub tenant_id: Option<TnId>,
	pub client: &'a Client,
	pub step: &'a PolicyStep,
	pub journey_data: &'a mut DataMap,
	pub user_input: &'a DataMap,
	/// Set by handlers that establish the authenticated subject
	/// (LocalLogin, WebAuthn, Ldap) — mirrors §4.2 "on success sets
	/// context.user_id".
	pub user_id: &'a mut Option<String>,
	pub amr: &'a mut Vec<String>,
}

impl StepExecutionContext<'_> {
	pub fn config_str(&self, key: &str) -> Option<&str> {
		self.step.config.get(key).and_then(Value::as_str)
	}

	pub fn config_bool(&self, key: &str, default: bool) -> bool {
		self.step.config.get(key).and_then(Value::as_bool).unwrap_or(default)
	}
}

/// Side effects must be ordered before `Success` is reported (§4.2
/// "side-effect-ordered"); `cancellation` is honored cooperatively by
/// awaiting it alongside any blocking I/O the handler performs.
#[async_trait]
pub trait StepHandler: Send + Sync {
	/// The registry key this handler answers to (`PolicyStep::step_type`).
	fn step_type(&self) -> &'static str;

	async fn execute(
		&self,
		ctx: &mut StepExecutionContext<'_>,
		cancellation: tokio_util::sync::CancellationToken,
	) -> ClResult<StepHandlerResult>;
}

/// Process-wide map from `step_type` to implementation (§9 "Global
/// state ... Initialize at startup ... never mutate after construction
/// except through explicit invalidators" — the registry has no
/// invalidator since handlers are fixed at process start).
#[derive(Default)]
pub struct StepHandlerRegistry {
	handlers: HashMap<&'static str, Arc<dyn StepHandler>>,
}

impl StepHandlerRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, handler: Arc<dyn StepHandler>) {
		self.handlers.insert(handler.step_type(), handler);
	}

	pub fn get(&self, step_type: &str) -> ClResult<Arc<dyn StepHandler>> {
		self.handlers
			.get(step_type)
			.cloned()
			.ok_or_else(|| Error::StepConfigError(format!("no step handler registered for {step_type}")))
	}
}

/// Default per-step handler execution timeout fallback (§5).
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(300);

// vim: ts=4
