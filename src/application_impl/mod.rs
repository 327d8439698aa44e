mod password;
mod token_codec;
mod token_service_fake;
mod token_service_impl;
mod user_service_fake;
mod user_service_impl;

pub use password::*;
pub use token_codec::*;
pub use token_service_fake::*;
pub use token_service_impl::*;
pub use user_service_fake::*;
pub use user_service_impl::*;
