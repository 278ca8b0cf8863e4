#![forbid(unsafe_code)]

pub mod connection;
pub mod health;
pub mod hub;
pub mod registry;



#[cfg(test)]
mod registry_tests;
