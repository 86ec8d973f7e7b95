//! Data models for quotes, schools, users and tokens.

mod quote;
mod school;
mod token;
mod user;

pub use quote::*;
pub use school::*;
pub use token::*;
pub use user::*;
