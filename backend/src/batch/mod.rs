pub mod batch_service;
pub mod processor;
