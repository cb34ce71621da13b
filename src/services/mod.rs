pub mod aggregator;
pub mod coordinator;
pub mod status_poller;

pub use coordinator::{CoordinatorSettings, DiscoveryCoordinator};
pub use status_poller::{PollControl, PollEvent, PollerHandle, StatusPoller};
