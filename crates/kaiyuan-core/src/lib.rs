pub mod models;
pub mod password;
pub mod provider;
pub mod validate;
