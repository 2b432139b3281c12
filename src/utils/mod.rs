// Shared browser utilities
pub mod constants;
mod timeout;
mod wait_for_ready;

pub use timeout::validate_navigation_timeout;
pub use wait_for_ready::wait_for_ready;
