pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod logging;
pub mod network;
pub mod session_management;
pub mod statistics;
pub mod tarpit;
pub mod web_interface;

pub use controller::Controller;
