//! runpanel - a registry of "things currently running".
//!
//! Independently registered providers (open tabs, compute sessions, ...)
//! each report their running items through one capability contract. A
//! display layer iterates the [`registry::ProviderRegistry`], calls
//! `running()` on each provider, and re-polls whenever a provider's
//! `running_changed` signal fires.

pub mod config;
pub mod error;
pub mod item;
pub mod memory;
pub mod open_tabs;
pub mod provider;
pub mod registry;
pub mod session;
pub mod shell;
pub mod signal;
pub mod signaler;
pub mod workspace;
