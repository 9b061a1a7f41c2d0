pub mod auth;
pub mod configuration;
pub mod document;
pub mod editor;
pub mod error;
pub mod layout;
pub mod registry;
pub mod routes;
pub mod startup;
pub mod store;
pub mod sync;
pub mod telemetry;
