//! Client core for the plant-identification app.
//!
//! ARCHITECTURE
//! ============
//! `session` decides whether a stored login is still usable, `validation`
//! screens form input before it leaves the device, and `api` composes both
//! around the backend's HTTP endpoints. `store` is the persisted key-value seam
//! the session reads through.

pub mod api;
pub mod config;
pub mod session;
pub mod store;
pub mod validation;
