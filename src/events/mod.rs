mod bus;
mod handlers;
mod types;

pub use bus::{EventBus, EventReceiver, DEFAULT_BUS_CAPACITY};
pub use handlers::ProgressSyncHandler;
pub use types::{AppEvent, AppEventPayload, EventSequence, NoticeLevel, RefreshReason};
