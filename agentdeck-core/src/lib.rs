//! Template-to-instance synchronization engine.
//!
//! Administrators attach templates to categories; every project of a
//! category carries one per-user instance of each attached template. The
//! [`services::SyncService`] reconciles instances in bulk after admin edits,
//! the [`services::LazyMaterializer`] creates them on first use, and
//! [`AppContext`] wires both to the store.

pub mod common;
pub mod config;
pub mod database;
pub mod errors;
pub mod services;

pub mod app_context;
pub use app_context::AppContext;
