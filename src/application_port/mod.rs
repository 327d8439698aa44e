mod token_service;
mod user_service;

pub use token_service::*;
pub use user_service::*;
