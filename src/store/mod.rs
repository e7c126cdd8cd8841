// Durable state: jobs, their triggers, and the per-client user records the
// executor dispatches. The database is the source of truth; the in-memory
// trigger queue is only a cache of the active schedule.

pub mod jobs;
pub mod triggers;
pub mod users;

pub use jobs::{JobStore, JobTxn};
pub use triggers::{RestoredTrigger, TriggerStore};
pub use users::UserStore;
