//! Domain types of the Redis backplane: connection lifecycle, notifications,
//! the publish script and its reply.

pub mod events;
pub mod script;
pub mod state;

pub use events::ConnectionEvent;
pub use script::{BackplaneScript, PublishReceipt, ScriptValue};
pub use state::ConnectionState;
