pub mod item;
pub mod permission;
pub mod token;
pub mod user;

pub use item::{Item, ItemFilter, ItemPatch, NewItem};
pub use permission::Permissions;
pub use token::{Scope, Token};
pub use user::{Credentials, NewUser, RegisterUser, User};
