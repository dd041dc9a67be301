pub mod day;
pub mod models;
pub mod session;
pub mod settlement;
pub mod weekly_badge;
