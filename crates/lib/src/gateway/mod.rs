//! Gateway: HTTP entry point of the relay.
//!
//! Single port serves the health probe (`GET /`) and, in webhook mode, Telegram updates
//! (`POST /webhook`). In polling mode the getUpdates loop feeds the same inbound queue.

mod server;

pub use server::{build_app, run_gateway, GatewayState, InboundMode};
