//! # Dagnet Client
//!
//! The application-facing layer of the SDK:
//! - `factory` - builds the canonical envelope for every transaction shape
//! - `simulator` - pre-flight validation and balance analysis
//! - `batch` - concurrent execution of independent read operations
//! - `stream` - live events over push or polling transports
//! - `blocking` - synchronous wrappers over the async surface
//!
//! The async surface is primary; nothing here duplicates logic for the
//! blocking wrappers, they simply drive a private runtime.

pub mod batch;
pub mod blocking;
pub mod error;
pub mod events;
pub mod factory;
pub mod simulator;
pub mod stream;

pub use batch::{BatchCall, BatchData, BatchEngine, BatchItem, BatchOperation, BatchReport};
pub use error::StreamError;
pub use events::{EventBody, EventFilter, EventKind, Notification, StreamEvent};
pub use simulator::{
    ChainSimulationReport, Confidence, EnvironmentalError, SimulationReport, Simulator,
};
pub use stream::{NetworkEventStream, StreamOptions, StreamState, StreamStats, TransportMode};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::batch::{BatchCall, BatchEngine, BatchOperation};
    pub use crate::events::{EventFilter, EventKind};
    pub use crate::factory::{self, ChainedTransfer, DataSpec, TransferSpec};
    pub use crate::simulator::Simulator;
    pub use crate::stream::NetworkEventStream;
    pub use dagnet_core::prelude::*;
    pub use dagnet_crypto::Account;
    pub use dagnet_network::{ClientConfig, Deployment, NetworkClient};
}
