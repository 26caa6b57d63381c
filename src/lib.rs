//! Tarnis - MMORPG Server Emulator
//!
//! A Rust server emulator for a legacy MMORPG's binary client-server
//! protocol. The heart of the crate is the framing/codec/dispatch layer
//! in [`protocol`] and [`network`]; the [`servers`] modules are the thin
//! login and game services built on top of it.

/// Server configuration (YAML)
pub mod config;
/// Connection plumbing: decode pipeline, dispatch table, outbound queue
pub mod network;
/// Binary protocol: primitive codec, frame envelope, message catalog
pub mod protocol;
/// Server implementations (login, game)
pub mod servers;
