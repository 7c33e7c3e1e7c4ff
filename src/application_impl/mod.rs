mod auth_service_impl;
mod credential_hasher_impl;
mod jwt_codec;
mod token_service_impl;

pub use auth_service_impl::*;
pub use credential_hasher_impl::*;
pub use jwt_codec::*;
pub use token_service_impl::*;
