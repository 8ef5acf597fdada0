//! Gateway wire protocol
//!
//! Defines the inbound and outbound event schemas and websocket close codes.

mod client_event;
mod close_codes;
mod server_event;

pub use client_event::ClientEvent;
pub use close_codes::CloseCode;
pub use server_event::{ErrorPayload, ReadReceiptPayload, ServerEvent, TypingPayload};
