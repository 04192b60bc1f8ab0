pub mod accounts;
pub mod app_state;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod identity_client;
pub mod login;
pub mod permissions;
pub mod server;

#[cfg(test)]
mod testing;
