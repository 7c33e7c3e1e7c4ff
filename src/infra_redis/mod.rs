mod token_version_cache_redis;

pub use token_version_cache_redis::*;
