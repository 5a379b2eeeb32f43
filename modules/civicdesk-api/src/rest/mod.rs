pub mod dashboard;
pub mod issues;
pub mod users;
