//! Background cleanup task for expired journey state, scheduled via the
//! core `Scheduler<App>` (mirrors the teacher's cron-scheduled cleanup
//! tasks).

use async_trait::async_trait;

use idplat_core::scheduler::{Task, TaskId};
use idplat_core::App;
use idplat_types::prelude::*;
use idplat_types::types::Timestamp;

#[derive(Debug)]
pub struct JourneyCleanupTask;

impl JourneyCleanupTask {
	pub fn new() -> std::sync::Arc<Self> {
		std::sync::Arc::new(Self)
	}
}

#[async_trait]
impl Task<App> for JourneyCleanupTask {
	fn kind() -> &'static str
	where
		Self: Sized,
	{
		"journey_cleanup"
	}

	fn build(_id: TaskId, _context: &str) -> ClResult<std::sync::Arc<dyn Task<App>>>
	where
		Self: Sized,
	{
		Ok(JourneyCleanupTask::new())
	}

	fn serialize(&self) -> String {
		String::new()
	}

	fn kind_of(&self) -> &'static str {
		"journey_cleanup"
	}

	async fn run(&self, app: &App) -> ClResult<()> {
		let deleted = app.journey_state_store.delete_expired(Timestamp::now()).await?;
		if deleted > 0 {
			info!("journey cleanup removed {deleted} expired journey states");
		}
		Ok(())
	}
}

// vim: ts=4
