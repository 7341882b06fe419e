pub mod dispatcher;
pub mod event_processor;

pub use dispatcher::EventDispatcher;
pub use event_processor::{decode_event, process_event, EventContext};
