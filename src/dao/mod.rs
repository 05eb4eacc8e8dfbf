/// Namespaced local cache of per-identity records.
pub mod cache_store;
/// Record definitions shared by the cache, the backend and the views.
pub mod models;
/// Backend abstraction and its transport implementations.
pub mod remote;
/// Local persistence error types.
pub mod storage;
