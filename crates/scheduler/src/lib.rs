pub mod api;
pub mod error;
pub mod executor;
pub mod lane;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod route_events;
pub mod runtime;

pub use api::{Dispatcher, SchedulerService};
pub use registry::{Registry, SessionCtx};
pub use route_events::{route_event_channel, RouteEvent, RouteEventReceiver, RouteEventSender};
