//! Journey orchestrator (§4.1): advances a journey from its starting
//! step to a terminal state by dispatching to registered step handlers,
//! serializing step execution per journey id via `JourneyStateStore::lock`.

use idplat_core::step_handler::{StepExecutionContext, StepHandlerResult};
use idplat_types::condition::{self, MatchContext};
use idplat_types::prelude::*;
use idplat_types::types::{
	Client, DataMap, JourneyError, JourneyPolicy, JourneyState, JourneyStatus, JourneyType, PolicyStep,
};
use idplat_types::utils::random_handle;

use idplat_core::App;

pub struct JourneyContext {
	pub tenant_id: Option<TnId>,
	pub client: Client,
	pub journey_type: JourneyType,
	pub scopes: Vec<String>,
	pub acr_values: Vec<String>,
	pub additional_parameters: DataMap,
	pub correlation_id: String,
}

#[derive(Debug)]
pub enum JourneyResult {
	AwaitingInput { journey_id: String, view_name: String, view_model: serde_json::Value },
	Completed { journey_id: String, journey_data: DataMap, user_id: Option<String>, amr: Vec<String> },
	Failed { journey_id: String, code: String, description: String },
}

pub struct JourneyStepInput {
	pub step_id: String,
	pub input: DataMap,
}

pub async fn start(app: &App, ctx: JourneyContext) -> ClResult<JourneyResult> {
	let match_ctx = MatchContext {
		tenant_id: ctx.tenant_id,
		client_id: ctx.client.client_id.clone(),
		journey_type: ctx.journey_type,
		scopes: ctx.scopes.clone(),
		acr_values: ctx.acr_values.clone(),
		additional_parameters: ctx.additional_parameters.clone(),
	};
	let policy = app.policy_store.find_matching(&match_ctx).await?.ok_or(Error::NoPolicy)?;
	start_with_policy(app, policy, ctx).await
}

/// Lower-level variant that skips policy matching (§4.1 "start(Policy,
/// StartContext)").
pub async fn start_with_policy(app: &App, policy: JourneyPolicy, ctx: JourneyContext) -> ClResult<JourneyResult> {
	let first_step = first_step_by_order(&policy)
		.ok_or_else(|| Error::InvalidPolicy(format!("policy {} has zero steps", policy.id)))?;

	let now = Timestamp::now();
	let mut state = JourneyState {
		id: random_handle()?,
		policy_id: policy.id.clone(),
		tenant_id: ctx.tenant_id,
		client_id: ctx.client.client_id.clone(),
		correlation_id: ctx.correlation_id,
		current_step_id: Some(first_step.id.clone()),
		status: JourneyStatus::InProgress,
		user_id: None,
		journey_data: DataMap::new(),
		user_input: DataMap::new(),
		completed_steps: Default::default(),
		retry_counts: Default::default(),
		started_at: now,
		expires_at: now.plus_seconds(policy.max_journey_duration_secs),
		last_activity_at: now,
		error: None,
	};
	app.journey_state_store.put_state(state.clone()).await?;

	run(app, &policy, &ctx.client, &mut state).await
}

pub async fn cancel(app: &App, journey_id: &str, reason: &str) -> ClResult<()> {
	let _guard = app.journey_state_store.lock(journey_id).await?;
	let mut state = app.journey_state_store.find_state(journey_id).await?;
	if state.status.is_terminal() {
		return Ok(());
	}
	state.status = JourneyStatus::Cancelled;
	state.error = Some(JourneyError { code: "cancelled".into(), description: reason.to_string() });
	state.last_activity_at = Timestamp::now();
	app.journey_state_store.put_state(state).await
}

pub async fn r#continue(app: &App, journey_id: &str, input: JourneyStepInput) -> ClResult<JourneyResult> {
	let _guard = app.journey_state_store.lock(journey_id).await?;
	let mut state = app.journey_state_store.find_state(journey_id).await?;

	if state.status.is_terminal() {
		return Err(Error::JourneyExpired);
	}

	let now = Timestamp::now();
	if state.expires_at.is_past(now) {
		state.status = JourneyStatus::Expired;
		app.journey_state_store.put_state(state.clone()).await?;
		return Err(Error::JourneyExpired);
	}

	match &state.current_step_id {
		Some(expected) if *expected == input.step_id => {}
		_ => return Err(Error::InvalidRequest("step_id does not match the journey's current step".into())),
	}

	let policy = app.policy_store.find_policy(&state.policy_id).await?;
	let client = app.client_store.find_client(state.tenant_id, &state.client_id).await?;

	state.user_input = input.input;
	state.status = JourneyStatus::InProgress;

	run(app, &policy, &client, &mut state).await
}

fn first_step_by_order(policy: &JourneyPolicy) -> Option<&PolicyStep> {
	policy.steps.iter().min_by_key(|s| s.order)
}

fn lowest_ordered_unvisited<'a>(
	policy: &'a JourneyPolicy,
	completed: &std::collections::BTreeSet<String>,
) -> Option<&'a PolicyStep> {
	policy
		.steps
		.iter()
		.filter(|s| !completed.contains(&s.id))
		.min_by_key(|s| s.order)
}

fn find_step<'a>(policy: &'a JourneyPolicy, step_id: &str) -> ClResult<&'a PolicyStep> {
	policy
		.steps
		.iter()
		.find(|s| s.id == step_id)
		.ok_or_else(|| Error::StepConfigError(format!("unknown step id {step_id}")))
}

/// The execution loop (§4.1 "Execution loop"): runs steps until the
/// journey suspends on `RequireInput` or reaches a terminal state.
async fn run(app: &App, policy: &JourneyPolicy, client: &Client, state: &mut JourneyState) -> ClResult<JourneyResult> {
	loop {
		let Some(step_id) = state.current_step_id.clone() else {
			state.status = JourneyStatus::Completed;
			app.journey_state_store.put_state(state.clone()).await?;
			return Ok(JourneyResult::Completed {
				journey_id: state.id.clone(),
				journey_data: state.journey_data.clone(),
				user_id: state.user_id.clone(),
				amr: amr_from_data(&state.journey_data),
			});
		};
		let step = find_step(policy, &step_id)?.clone();

		// Step 1: pre-conditions via the condition evaluator.
		let preconditions_pass = step.conditions.iter().all(|cond| {
			condition::evaluate_journey_data(&cond.attribute, cond.operator, &cond.value, &state.journey_data)
		});

		let outcome = if !preconditions_pass {
			StepHandlerResult::Skip
		} else if step.skip_if_completed && state.completed_steps.contains(&step.id) {
			StepHandlerResult::Skip
		} else {
			execute_step(app, client, &policy, &step, state).await?
		};

		match outcome {
			StepHandlerResult::Success(outputs) => {
				state.journey_data.extend(outputs);
				state.completed_steps.insert(step.id.clone());
				advance(policy, &step, state, None);
			}
			StepHandlerResult::Skip => {
				advance(policy, &step, state, None);
			}
			StepHandlerResult::Branch(target) => {
				state.completed_steps.insert(step.id.clone());
				advance(policy, &step, state, Some(target));
			}
			StepHandlerResult::Fail(code, description) => {
				if let Some(on_failure) = step.on_failure.clone() {
					state.current_step_id = Some(on_failure);
				} else {
					state.status = JourneyStatus::Failed;
					state.error = Some(JourneyError { code: code.clone(), description: description.clone() });
					state.last_activity_at = Timestamp::now();
					app.journey_state_store.put_state(state.clone()).await?;
					return Ok(JourneyResult::Failed { journey_id: state.id.clone(), code, description });
				}
			}
			StepHandlerResult::RequireInput(view_name, view_model) => {
				state.status = JourneyStatus::AwaitingInput;
				state.last_activity_at = Timestamp::now();
				app.journey_state_store.put_state(state.clone()).await?;
				return Ok(JourneyResult::AwaitingInput { journey_id: state.id.clone(), view_name, view_model });
			}
			StepHandlerResult::Complete => {
				state.status = JourneyStatus::Completed;
				state.completed_steps.insert(step.id.clone());
				state.last_activity_at = Timestamp::now();
				app.journey_state_store.put_state(state.clone()).await?;
				return Ok(JourneyResult::Completed {
					journey_id: state.id.clone(),
					journey_data: state.journey_data.clone(),
					user_id: state.user_id.clone(),
					amr: amr_from_data(&state.journey_data),
				});
			}
		}

		state.last_activity_at = Timestamp::now();
		app.journey_state_store.put_state(state.clone()).await?;
	}
}

/// Step 2: advance to `on_success`, else the output-designated branch,
/// else the lowest-ordered unvisited step, else terminate.
fn advance(policy: &JourneyPolicy, step: &PolicyStep, state: &mut JourneyState, branch_target: Option<String>) {
	let next = branch_target
		.and_then(|target| step.branches.get(&target).cloned())
		.or_else(|| step.on_success.clone())
		.or_else(|| lowest_ordered_unvisited(policy, &state.completed_steps).map(|s| s.id.clone()));
	state.current_step_id = next;
}

async fn execute_step(
	app: &App,
	client: &Client,
	_policy: &JourneyPolicy,
	step: &PolicyStep,
	state: &mut JourneyState,
) -> ClResult<StepHandlerResult> {
	let handler = app.step_handlers.get(&step.step_type)?;
	let timeout = std::time::Duration::from_secs(
		step.timeout_secs.unwrap_or(idplat_core::step_handler::DEFAULT_STEP_TIMEOUT.as_secs() as i64) as u64,
	);
	let cancellation = tokio_util::sync::CancellationToken::new();

	let mut user_id = state.user_id.clone();
	let mut amr: Vec<String> = state
		.journey_data
		.get("amr")
		.and_then(|v| v.as_array())
		.map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
		.unwrap_or_default();

	let outcome = {
		let mut ctx = StepExecutionContext {
			app,
			tenant_id: state.tenant_id,
			client,
			step,
			journey_data: &mut state.journey_data,
			user_input: &state.user_input,
			user_id: &mut user_id,
			amr: &mut amr,
		};
		tokio::time::timeout(timeout, handler.execute(&mut ctx, cancellation.clone()))
			.await
			.map_err(|_| Error::StepTimeout(step.id.clone()))?
	};

	state.user_id = user_id;
	if !amr.is_empty() {
		state.journey_data.insert("amr".into(), serde_json::Value::from(amr));
	}

	// Step 6: a raised error counts as a retry; once it exceeds
	// `max_retries` the step fails the same way an explicit `Fail` would.
	match outcome {
		Ok(res) => Ok(res),
		Err(e) => {
			let counter = state.retry_counts.entry(step.id.clone()).or_insert(0);
			*counter += 1;
			if *counter > step.max_retries {
				Ok(StepHandlerResult::Fail("step_config_error".into(), e.to_string()))
			} else {
				Err(e)
			}
		}
	}
}

fn amr_from_data(data: &DataMap) -> Vec<String> {
	data.get("amr")
		.and_then(|v| v.as_array())
		.map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
		.unwrap_or_default()
}

// vim: ts=4
