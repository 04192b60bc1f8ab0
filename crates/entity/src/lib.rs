pub mod account;
pub mod account_permission;
pub mod permission;

pub use account::Entity as Account;
pub use permission::Entity as Permission;
