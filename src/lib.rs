pub mod changes;
pub mod config;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod plugin;
pub mod service;
pub mod settings;
