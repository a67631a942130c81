//! relay-bot core library: correlation store, relay router, Telegram transport and the
//! gateway shell used by the CLI.

pub mod channels;
pub mod commands;
pub mod config;
pub mod correlation;
pub mod gateway;
pub mod init;
pub mod relay;
