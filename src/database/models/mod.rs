pub mod movie;
pub mod permission;
pub mod token;
pub mod user;

pub use movie::{Metadata, Movie, MovieFilters, MovieInput};
pub use permission::Permissions;
pub use token::{TokenRecord, TokenScope};
pub use user::{NewUser, User};
