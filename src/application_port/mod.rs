mod auth_service;
mod token_codec;
mod token_service;

pub use auth_service::*;
pub use token_codec::*;
pub use token_service::*;
