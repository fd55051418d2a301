pub mod users;
pub mod sessions;
pub mod databases;
pub mod database_versions;
