pub mod metrics_gateway;
pub mod repository;
pub mod task_handler;

pub use metrics_gateway::*;
pub use repository::*;
pub use task_handler::*;
