mod user_repo_pg;

pub use user_repo_pg::*;
