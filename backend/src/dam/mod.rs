pub mod catalog;
pub mod connection_service;
