//! Real-time transport: envelope codec, hub, and per-connection loops.
//!
//! The hub owns room membership and fans envelopes out to each member's
//! bounded outbound queue; each connection drains its queue to the socket
//! from a dedicated write loop while a read loop dispatches inbound
//! messages. Slow consumers are dropped rather than allowed to stall a
//! room; see [`hub`] for the policy.

pub mod connection;
pub mod envelope;
pub mod hub;
pub mod upgrade;

pub use connection::Connection;
pub use envelope::Envelope;
pub use hub::{Hub, Registration};
pub use upgrade::ws_upgrade;
