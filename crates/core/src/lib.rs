pub mod broker;
pub mod clock;
pub mod config;
pub mod config_loader;
pub mod store;
pub mod traits;

pub use broker::{AccountStatus, BrokerError, OrderAck, OrderSide, OrderTicket};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    AlertConfig, AppConfig, BrokerConfig, BrokerMode, HealthConfig, ScalerConfig, StorageConfig,
};
pub use config_loader::ConfigLoader;
pub use store::{JsonStore, StoreError, Versioned};
pub use traits::{BrokerAccount, OrderSubmitter};
