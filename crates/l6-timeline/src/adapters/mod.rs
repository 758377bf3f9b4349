mod event_store;
mod events;
mod state_center;

pub use event_store::EventStoreAdapter;
pub use events::{BusEventsPort, NoopEventsPort, TimelineRuntimeEvent};
pub use state_center::StateCenterAdapter;
