mod clock;

pub use clock::*;

// store

mod token_version_cache;

pub use token_version_cache::*;

// repo

mod refresh_token_repo;
mod user_repo;

pub use refresh_token_repo::*;
pub use user_repo::*;
