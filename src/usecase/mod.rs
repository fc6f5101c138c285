pub mod contracts;
pub mod customers;
pub mod deals;
pub mod duplicates;
pub mod error;
pub mod password;
pub mod ratings;
