pub mod handler_registry;
pub mod network_listener;


pub use handler_registry::HandlerRegistry;
pub use network_listener::NetworkListener;
