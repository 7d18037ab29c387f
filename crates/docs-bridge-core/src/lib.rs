//! Request/response correlation for the static docs bridge.
//!
//! This crate provides the fundamental building blocks:
//! - `BridgeMessage` - Call and response envelopes on the wire
//! - `BridgeConfig` - Host allow-list and target origin
//! - `MessagePort` - Outbound half of the cross-window channel
//! - `Dispatcher` - Issues calls and settles them from inbound responses

pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod port;
pub mod registry;

pub use config::{BridgeConfig, ConfigError};
pub use dispatcher::{Dispatcher, PendingCall};
pub use envelope::{BridgeMessage, CallEnvelope, ResponseEnvelope, TargetOrigin};
pub use error::BridgeError;
pub use port::{
    ChannelPort, EmbeddedFrame, InboundStream, MessagePort, ParentWindow, PortError, PostedMessage,
    window_pair,
};
pub use registry::{CallId, Settled};
