//! huddl - live support chat backend.
//!
//! A single-process, in-memory message broker that pairs anonymous site
//! visitors with human support agents over WebSocket. Rooms move through
//! `inactive → waiting → active → closed`; a sweeper reclaims abandoned and
//! closed rooms after a grace period.
//!
//! Layering, leaf to root:
//! - [`chat`]: room store, state machine, presence registry, broadcast
//!   routing, sweeper. Pure state; no transport knowledge.
//! - [`ws`]: WebSocket connection handlers and the outbound dispatcher.
//! - [`api`]: HTTP routes and shared application state.
//! - [`config`]: file/env configuration.

pub mod api;
pub mod chat;
pub mod config;
pub mod ws;
