//! Event model and event bus shared by every other `achub-*` crate.
//!
//! This crate owns the one piece of vocabulary every subsystem agrees on:
//! the [`Event`] taxonomy and the [`EventBus`] that fans events out to
//! sinks. It has no opinion about child processes, wire protocols, or tool
//! execution — those live in `achub-agent`, `achub-protocol`, and
//! `achub-tools` respectively.

pub mod bus;
pub mod event;
pub mod spec;

pub use bus::{EventBus, EventHandler, HandlerError, Subscription};
pub use event::Event;
pub use spec::{AgentSpec, ProtocolKind};
