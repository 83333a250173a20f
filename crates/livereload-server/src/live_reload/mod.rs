//! Live reload: session hub, wire protocol, socket handling and file watching.

mod debouncer;
mod hub;
mod protocol;
mod watcher;
mod websocket;

pub use hub::{Hub, SessionId};
pub use protocol::{OutboundCommand, PROTOCOLS};
pub use watcher::{FileWatcher, WatchOptions};
pub(crate) use websocket::ws_handler;
