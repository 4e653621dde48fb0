pub mod actions;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod live;
pub mod loader;
pub mod model;
pub mod notify;
pub mod permissions;
pub mod projector;
pub mod query;
pub mod routes;
pub mod server;
pub mod settings;
pub mod state;
pub mod store;
pub mod supervisor;
pub mod view;
