//! # Dagnet Network
//!
//! The network-facing half of the SDK:
//! - `Deployment` - named endpoint triples (block explorer, L0, L1)
//! - `Transport` - a pluggable async HTTP seam with retry and pooling
//! - `NetworkClient` - typed, idempotent reads plus transaction submission
//!
//! Everything above the transport sees a clean success/failure boundary;
//! retries and backoff live in the transport alone.

pub mod api;
pub mod config;
pub mod error;
pub mod testing;
pub mod transport;

pub use api::{BalanceInfo, NetworkClient, NodeInfo, PeerInfo, SnapshotInfo, TransactionRecord};
pub use config::{ClientConfig, Deployment};
pub use error::NetworkError;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};
