pub mod health;
pub mod jobs;
pub mod notifications;
pub mod user;
pub mod views;
pub mod ws;
