pub mod common;
pub mod meeting;
pub mod message;
pub mod profile;
pub mod workout;
