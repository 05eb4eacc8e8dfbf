//! Library crate for izlek-sync: the offline-first cache and polling room synchronization
//! behind the İzlek study client.

/// Client configuration loaded from disk.
pub mod config;
/// Local cache and backend access.
pub mod dao;
/// Validated user input.
pub mod dto;
/// Errors surfaced by the sync services.
pub mod error;
/// Synchronization services driving the views.
pub mod services;
/// Client-side state machines and view models.
pub mod state;
