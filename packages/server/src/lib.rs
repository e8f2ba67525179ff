//! Real-time chat transport over WebSocket.
//!
//! Each authenticated user holds at most one live connection. Inbound frames are
//! routed by command name to typed handlers; chat messages fan out to the online
//! participants of a chat and read receipts go back to the original sender.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
