pub mod auth;

pub use auth::{issue_token, AuthActor, Claims};
