pub mod database;
pub mod scheduling;
