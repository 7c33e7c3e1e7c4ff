//! Process-local adapters, selected with the `memory` backends and used by
//! the test suites.

mod manual_clock;
mod refresh_token_repo_memory;
mod token_version_cache_memory;
mod user_repo_memory;

pub use manual_clock::*;
pub use refresh_token_repo_memory::*;
pub use token_version_cache_memory::*;
pub use user_repo_memory::*;
