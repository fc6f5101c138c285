pub mod customer;
pub mod deal;
pub mod platform;
pub mod rating;
pub mod report;
pub mod submission;
