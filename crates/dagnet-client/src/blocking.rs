//! Synchronous wrappers over the async surface
//!
//! [`Client`] owns a private current-thread runtime and blocks on the async
//! implementations; no logic is duplicated here. The event stream stays
//! async-only, but [`Client::drive_stream`] will pump one for a bounded
//! duration from synchronous code.

use crate::batch::{BatchEngine, BatchOperation, BatchReport};
use crate::simulator::{SimulationReport, Simulator};
use crate::stream::NetworkEventStream;
use dagnet_core::types::{Address, MetagraphId};
use dagnet_core::{Envelope, ValidationError};
use dagnet_network::{
    BalanceInfo, ClientConfig, Deployment, NetworkClient, NetworkError, NodeInfo, PeerInfo,
    TransactionRecord, Transport,
};
use std::sync::Arc;
use std::time::Duration;

/// Blocking client over one deployment
pub struct Client {
    runtime: tokio::runtime::Runtime,
    network: Arc<NetworkClient>,
    simulator: Simulator,
}

impl Client {
    /// Connect a deployment through the default HTTP transport
    pub fn new(deployment: Deployment, config: ClientConfig) -> Result<Self, NetworkError> {
        let network = Arc::new(NetworkClient::new(deployment, config)?);
        Self::from_network(network)
    }

    /// Connect a deployment through a caller-supplied transport
    pub fn with_transport(
        deployment: Deployment,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, NetworkError> {
        let network = Arc::new(NetworkClient::with_transport(deployment, transport));
        Self::from_network(network)
    }

    fn from_network(network: Arc<NetworkClient>) -> Result<Self, NetworkError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;
        let simulator = Simulator::new(Arc::clone(&network));
        Ok(Self {
            runtime,
            network,
            simulator,
        })
    }

    /// The underlying async client
    pub fn network(&self) -> &Arc<NetworkClient> {
        &self.network
    }

    /// Balance and last reference of an address
    pub fn balance(&self, address: &Address) -> Result<BalanceInfo, NetworkError> {
        self.runtime.block_on(self.network.balance(address))
    }

    /// Last accepted ordinal of an address
    pub fn ordinal(&self, address: &Address) -> Result<u64, NetworkError> {
        self.runtime.block_on(self.network.ordinal(address))
    }

    /// Recent transactions involving an address
    pub fn transactions(
        &self,
        address: &Address,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, NetworkError> {
        self.runtime
            .block_on(self.network.transactions(address, limit))
    }

    /// Recent transactions across the network
    pub fn recent_transactions(&self, limit: usize) -> Result<Vec<TransactionRecord>, NetworkError> {
        self.runtime
            .block_on(self.network.recent_transactions(limit))
    }

    /// Node identity and state
    pub fn node_info(&self) -> Result<NodeInfo, NetworkError> {
        self.runtime.block_on(self.network.node_info())
    }

    /// Cluster peer listing
    pub fn cluster_info(&self) -> Result<Vec<PeerInfo>, NetworkError> {
        self.runtime.block_on(self.network.cluster_info())
    }

    /// Token balance of an address on a metagraph
    pub fn metagraph_balance(
        &self,
        metagraph_id: &MetagraphId,
        address: &Address,
    ) -> Result<BalanceInfo, NetworkError> {
        self.runtime
            .block_on(self.network.metagraph_balance(metagraph_id, address))
    }

    /// Submit a signed envelope; returns the transaction hash
    pub fn submit(&self, envelope: &Envelope) -> Result<String, NetworkError> {
        self.runtime.block_on(self.network.submit(envelope))
    }

    /// Simulate an envelope with online balance checks
    pub fn simulate(&self, envelope: &Envelope) -> SimulationReport {
        self.runtime.block_on(self.simulator.simulate(envelope))
    }

    /// Execute a batch with default concurrency
    pub fn execute_batch(
        &self,
        operations: Vec<BatchOperation>,
    ) -> Result<BatchReport, ValidationError> {
        let engine = BatchEngine::new(Arc::clone(&self.network));
        self.runtime.block_on(engine.execute(operations))
    }

    /// Drive an event stream for a bounded duration, then disconnect it.
    ///
    /// The stream delivers through its handlers while this call blocks.
    pub fn drive_stream(&self, stream: &NetworkEventStream, duration: Duration) {
        self.runtime.block_on(async {
            if stream.connect().await.is_ok() {
                tokio::time::sleep(duration).await;
            }
            stream.disconnect().await;
        });
    }
}
