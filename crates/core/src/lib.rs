pub mod clock;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use errors::*;
pub use traits::{HealthRepository, MetricsGateway, TaskHandler};
