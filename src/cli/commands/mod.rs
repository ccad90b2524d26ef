pub mod auth;
pub mod journal;
pub mod projects;
pub mod secrets;
