//! Query layer over the Postgres tables.

mod user_repo;

pub use user_repo::UserRepo;
