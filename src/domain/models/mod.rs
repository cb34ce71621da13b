pub mod config;
pub mod discovery;
pub mod view;

pub use config::{
    Config, DeliveryMode, LogFormat, LoggingConfig, PollingConfig, RotationPolicy, ServiceConfig,
    StoreConfig,
};
pub use discovery::{
    ConfigTrial, DiscoveryPhase, DiscoverySession, DiscoveryStatus, DiscoveryTarget,
    DomainResult, StartOptions, StartRequest, StartResponse, StrategyFamily, TrialStatus,
};
pub use view::{
    ActivityEntry, ActivityLevel, CoordinatorState, DiscoveryView, PhaseGroup, Progress,
    RankedDomain,
};
