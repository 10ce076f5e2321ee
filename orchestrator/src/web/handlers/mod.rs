//! HTTP request handlers for the orchestrator API.
//!
//! This module is organized by domain:
//! - `common` - Error mapping and shared response types
//! - `events` - Server-sent lifecycle events
//! - `logs` - Run history queries
//! - `system` - Scheduler status and health
//! - `tasks` - Task CRUD, toggling and manual runs

pub mod common;
pub mod events;
pub mod logs;
pub mod system;
pub mod tasks;

pub use events::*;
pub use logs::*;
pub use system::*;
pub use tasks::*;
