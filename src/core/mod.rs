// Core value types shared by commands, executors, and the query facade.
pub mod conventions;
pub mod error;
pub mod http;
pub mod listeners;
pub mod node;
