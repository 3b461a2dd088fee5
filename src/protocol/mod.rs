//! Wire protocol
//!
//! Every frame is a flat JSON object with a `type` discriminator:
//!
//! ```text
//! server → client   {"type":"viewerCount","count":3}
//! server → client   {"type":"connection","status":"connected"}
//! client → server   {"type":"ping"}            → {"type":"pong"} (sender only)
//! client → server   {"type":"message","data":…} → same frame to every other peer
//! ```
//!
//! Inbound frames are decoded exactly once, at the router boundary, into
//! [`InboundMessage`]. Outbound frames are encoded once per broadcast and the
//! resulting `Bytes` are shared by every recipient.

pub mod constants;
pub mod message;

pub use message::{DecodeError, InboundMessage, OutboundMessage};
