pub mod logging;
pub mod tasks;

pub use logging::init_logging;
pub use tasks::TaskGroup;
