pub mod customers;
pub mod deals;
pub mod ratings;
