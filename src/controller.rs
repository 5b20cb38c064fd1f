pub mod controller_handler;
pub mod server_state;
pub mod shutdown;

pub use controller_handler::{Controller, RunningServer};
pub use server_state::ServerState;
pub use shutdown::ShutdownCoordinator;
