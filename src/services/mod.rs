pub mod jobs;
pub mod publisher;

pub use jobs::JobService;
pub use publisher::{GatewayPublisher, PublishAck, PublishError, RecordPublisher};
