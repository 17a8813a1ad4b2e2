//! Typed read API over a deployment
//!
//! [`NetworkClient`] binds a [`Deployment`] to a [`Transport`] and exposes the
//! canonical read operations plus transaction submission. All reads are
//! idempotent. Responses are typed records; fields the SDK does not know are
//! preserved in a flattened side map and never drive logic.

use crate::config::{ClientConfig, Deployment};
use crate::error::NetworkError;
use crate::transport::{HttpRequest, HttpTransport, Transport};
use dagnet_core::types::{Address, MetagraphId, TransactionRef};
use dagnet_core::{validation, Envelope, TransactionValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Balance and chain position of an address
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceInfo {
    /// Balance in smallest units
    #[serde(default)]
    pub balance: u64,
    /// Last accepted ordinal for the address
    #[serde(default)]
    pub ordinal: u64,
    /// Last accepted transaction reference, if the address has history
    #[serde(default, rename = "lastTransactionRef")]
    pub last_ref: Option<TransactionRef>,
    /// Fields the SDK does not interpret
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl BalanceInfo {
    /// The state of an address with no history
    pub fn empty() -> Self {
        Self {
            balance: 0,
            ordinal: 0,
            last_ref: None,
            extra: HashMap::new(),
        }
    }

    /// The parent reference to chain the next transaction onto
    pub fn parent_ref(&self) -> TransactionRef {
        self.last_ref.clone().unwrap_or_else(TransactionRef::genesis)
    }
}

/// One transaction as reported by the block explorer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction hash
    #[serde(default)]
    pub hash: String,
    /// Sending address
    #[serde(default)]
    pub source: String,
    /// Receiving address
    #[serde(default)]
    pub destination: String,
    /// Amount in smallest units
    #[serde(default)]
    pub amount: u64,
    /// Fee in smallest units
    #[serde(default)]
    pub fee: u64,
    /// Parent reference
    #[serde(default)]
    pub parent: Option<TransactionRef>,
    /// Timestamp as reported by the explorer (ISO string or epoch number)
    #[serde(default)]
    pub timestamp: Option<Value>,
    /// Transaction type tag
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Fields the SDK does not interpret
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Identity and state of the queried node
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Deployment software version
    #[serde(default)]
    pub version: Option<String>,
    /// Node state string
    #[serde(default)]
    pub state: Option<String>,
    /// Fields the SDK does not interpret
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// One peer in the cluster listing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Peer identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Peer address
    #[serde(default)]
    pub ip: Option<String>,
    /// Peer state string
    #[serde(default)]
    pub state: Option<String>,
    /// Fields the SDK does not interpret
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// The most recent global snapshot tip
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Snapshot hash
    #[serde(default)]
    pub hash: Option<String>,
    /// Snapshot ordinal
    #[serde(default)]
    pub ordinal: Option<u64>,
    /// Snapshot timestamp
    #[serde(default)]
    pub timestamp: Option<Value>,
    /// Fields the SDK does not interpret
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Typed client for one deployment
#[derive(Clone)]
pub struct NetworkClient {
    deployment: Deployment,
    transport: Arc<dyn Transport>,
}

impl NetworkClient {
    /// Connect a deployment through the default HTTP transport
    pub fn new(deployment: Deployment, config: ClientConfig) -> Result<Self, NetworkError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(deployment, Arc::new(transport)))
    }

    /// Connect a deployment through a caller-supplied transport
    pub fn with_transport(deployment: Deployment, transport: Arc<dyn Transport>) -> Self {
        Self {
            deployment,
            transport,
        }
    }

    /// The deployment this client talks to
    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Balance and last reference of an address.
    ///
    /// An address with no history reads as zero balance with the genesis
    /// reference rather than an error.
    pub async fn balance(&self, address: &Address) -> Result<BalanceInfo, NetworkError> {
        let url = format!(
            "{}/addresses/{}/balance",
            self.deployment.l1_url, address
        );
        match self.get_json::<BalanceInfo>(&url).await {
            Ok(info) => Ok(info),
            Err(NetworkError::HttpStatus { status: 404, .. }) => Ok(BalanceInfo::empty()),
            Err(e) => Err(e),
        }
    }

    /// The last accepted ordinal for an address
    pub async fn ordinal(&self, address: &Address) -> Result<u64, NetworkError> {
        Ok(self.balance(address).await?.ordinal)
    }

    /// Recent transactions involving an address, newest first
    pub async fn transactions(
        &self,
        address: &Address,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, NetworkError> {
        let url = format!(
            "{}/addresses/{}/transactions?limit={limit}",
            self.deployment.be_url, address
        );
        self.get_json(&url).await
    }

    /// Recent transactions across the whole network, newest first
    pub async fn recent_transactions(
        &self,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, NetworkError> {
        let url = format!("{}/transactions?limit={limit}", self.deployment.be_url);
        self.get_json(&url).await
    }

    /// Version, identity and state of the L0 node answering for the deployment
    pub async fn node_info(&self) -> Result<NodeInfo, NetworkError> {
        let url = format!("{}/node/info", self.deployment.l0_url);
        self.get_json(&url).await
    }

    /// The deployment's cluster peers and their states
    pub async fn cluster_info(&self) -> Result<Vec<PeerInfo>, NetworkError> {
        let url = format!("{}/cluster/info", self.deployment.l0_url);
        self.get_json(&url).await
    }

    /// The latest global snapshot tip
    pub async fn latest_snapshot(&self) -> Result<SnapshotInfo, NetworkError> {
        let url = format!(
            "{}/global-snapshots/latest/combined",
            self.deployment.l0_url
        );
        let response = self.transport.execute(&HttpRequest::get(&url)).await?;
        let value: Value = response.json()?;
        // The combined endpoint pairs the snapshot with node info; take the
        // snapshot half when it does.
        let snapshot = match unwrap_data(value) {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            other => other,
        };
        serde_json::from_value(snapshot)
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))
    }

    /// Local address validation; no network round trip
    pub fn validate_address(&self, address: &str) -> bool {
        validation::is_valid_address(address)
    }

    /// Submit a signed envelope; returns the transaction hash on acceptance.
    ///
    /// Token transfers go to the L1 transaction endpoint; data submissions
    /// are routed to their metagraph's data endpoint. A 4xx answer with a
    /// structured `{error: {code, message}}` body is surfaced as
    /// [`NetworkError::Rejected`].
    pub async fn submit(&self, envelope: &Envelope) -> Result<String, NetworkError> {
        validation::validate_envelope(envelope)?;

        let url = match &envelope.value {
            TransactionValue::DataSubmission { metagraph_id, .. } => format!(
                "{}/metagraph/{}/data",
                self.deployment.l1_url, metagraph_id
            ),
            TransactionValue::Transfer { .. } => {
                format!("{}/transactions", self.deployment.l1_url)
            }
        };
        let body = serde_json::to_value(envelope)
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;

        match self.transport.execute(&HttpRequest::post(&url, body)).await {
            Ok(response) => {
                let value: Value = response.json()?;
                extract_hash(unwrap_data(value)).ok_or_else(|| {
                    NetworkError::InvalidResponse("submission response carries no hash".into())
                })
            }
            Err(NetworkError::HttpStatus { status, body }) if (400..500).contains(&status) => {
                Err(parse_rejection(status, body))
            }
            Err(e) => Err(e),
        }
    }

    /// Token balance of an address on a metagraph
    pub async fn metagraph_balance(
        &self,
        metagraph_id: &MetagraphId,
        address: &Address,
    ) -> Result<BalanceInfo, NetworkError> {
        let url = format!(
            "{}/metagraph/{}/addresses/{}/balance",
            self.deployment.l1_url, metagraph_id, address
        );
        match self.get_json::<BalanceInfo>(&url).await {
            Ok(info) => Ok(info),
            Err(NetworkError::HttpStatus { status: 404, .. }) => Ok(BalanceInfo::empty()),
            Err(e) => Err(e),
        }
    }

    /// Recent transactions on a metagraph
    pub async fn metagraph_transactions(
        &self,
        metagraph_id: &MetagraphId,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, NetworkError> {
        let url = format!(
            "{}/metagraph/{}/transactions?limit={limit}",
            self.deployment.be_url, metagraph_id
        );
        self.get_json(&url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, NetworkError> {
        let response = self.transport.execute(&HttpRequest::get(url)).await?;
        let value: Value = response.json()?;
        serde_json::from_value(unwrap_data(value))
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))
    }
}

/// Unwrap the `{"data": ...}` envelope the block explorer wraps lists in
fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn extract_hash(value: Value) -> Option<String> {
    value
        .get("hash")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_rejection(status: u16, body: String) -> NetworkError {
    if let Ok(value) = serde_json::from_str::<Value>(&body) {
        if let Some(error) = value.get("error") {
            let code = error
                .get("code")
                .map(value_to_string)
                .unwrap_or_else(|| status.to_string());
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("transaction rejected")
                .to_string();
            return NetworkError::Rejected { code, message };
        }
    }
    NetworkError::HttpStatus { status, body }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use dagnet_core::codec::address_from_public_key;
    use dagnet_crypto::Account;
    use serde_json::json;

    fn addr(seed: u8) -> Address {
        address_from_public_key(&[seed; 64]).expect("derivable")
    }

    fn client(mock: Arc<MockTransport>) -> NetworkClient {
        NetworkClient::with_transport(Deployment::test(), mock)
    }

    #[tokio::test]
    async fn test_balance_parses_last_ref() {
        let mock = MockTransport::new();
        mock.push_json(
            200,
            json!({
                "balance": 250_000_000u64,
                "ordinal": 7,
                "lastTransactionRef": {"hash": "ab".repeat(32), "ordinal": 7},
                "unknownField": true
            }),
        );

        let info = client(mock).balance(&addr(1)).await.unwrap();
        assert_eq!(info.balance, 250_000_000);
        assert_eq!(info.ordinal, 7);
        assert_eq!(info.parent_ref().ordinal, 7);
        assert!(info.extra.contains_key("unknownField"));
    }

    #[tokio::test]
    async fn test_balance_of_unknown_address_is_zero() {
        let mock = MockTransport::new();
        mock.push_json(404, json!({"message": "address not found"}));

        let info = client(mock).balance(&addr(2)).await.unwrap();
        assert_eq!(info.balance, 0);
        assert!(info.parent_ref().is_genesis());
    }

    #[tokio::test]
    async fn test_transactions_accepts_data_wrapper_and_bare_list() {
        let record = json!({
            "hash": "cd".repeat(32),
            "source": addr(1).as_str(),
            "destination": addr(2).as_str(),
            "amount": 10,
            "fee": 0,
            "parent": {"hash": "00".repeat(32), "ordinal": 0},
            "timestamp": "2026-08-01T10:00:00Z",
            "type": "transfer"
        });

        let mock = MockTransport::new();
        mock.push_json(200, json!({"data": [record.clone()]}));
        mock.push_json(200, json!([record]));

        let c = client(mock);
        let wrapped = c.transactions(&addr(1), 5).await.unwrap();
        let bare = c.recent_transactions(5).await.unwrap();
        assert_eq!(wrapped.len(), 1);
        assert_eq!(bare.len(), 1);
        assert_eq!(wrapped[0].kind.as_deref(), Some("transfer"));
    }

    #[tokio::test]
    async fn test_node_and_cluster_info() {
        let mock = MockTransport::new();
        mock.route_json(
            "/node/info",
            200,
            json!({"id": "node-1", "version": "3.2.1", "state": "Ready"}),
        );
        mock.route_json(
            "/cluster/info",
            200,
            json!([
                {"id": "node-1", "ip": "10.0.0.1", "state": "Ready"},
                {"id": "node-2", "ip": "10.0.0.2", "state": "Observing"}
            ]),
        );

        let c = client(mock);
        let node = c.node_info().await.unwrap();
        assert_eq!(node.version.as_deref(), Some("3.2.1"));

        let peers = c.cluster_info().await.unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[1].state.as_deref(), Some("Observing"));
    }

    #[tokio::test]
    async fn test_latest_snapshot_takes_combined_head() {
        let mock = MockTransport::new();
        mock.push_json(
            200,
            json!([{"hash": "ef".repeat(32), "ordinal": 91}, {"node": "info"}]),
        );

        let snapshot = client(mock).latest_snapshot().await.unwrap();
        assert_eq!(snapshot.ordinal, Some(91));
    }

    #[tokio::test]
    async fn test_submit_roundtrip_and_rejection() {
        let account = Account::generate().unwrap();
        let destination = Account::generate().unwrap();
        let value = dagnet_core::TransactionValue::Transfer {
            source: account.address().clone(),
            destination: destination.address().clone(),
            amount: 100,
            fee: 0,
            salt: 1,
            parent: TransactionRef::genesis(),
            metagraph_id: None,
        };
        let signed = account
            .sign_envelope(&dagnet_core::Envelope::unsigned(value))
            .unwrap();

        let mock = MockTransport::new();
        mock.push_json(200, json!({"hash": "aa".repeat(32)}));
        mock.push_json(
            400,
            json!({"error": {"code": "ParentOrdinalLowerThenLastTxOrdinal", "message": "stale parent"}}),
        );

        let c = client(mock.clone());
        let hash = c.submit(&signed).await.unwrap();
        assert_eq!(hash, "aa".repeat(32));

        let rejected = c.submit(&signed).await;
        match rejected {
            Err(NetworkError::Rejected { code, message }) => {
                assert_eq!(code, "ParentOrdinalLowerThenLastTxOrdinal");
                assert_eq!(message, "stale parent");
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        // Submission posted the full envelope
        let posted = &mock.requests()[0];
        let body = posted.body.as_ref().unwrap();
        assert!(body.get("value").is_some());
        assert!(body.get("proofs").is_some());
    }

    #[tokio::test]
    async fn test_submit_refuses_unsigned_envelope() {
        let value = dagnet_core::TransactionValue::Transfer {
            source: addr(1),
            destination: addr(2),
            amount: 100,
            fee: 0,
            salt: 1,
            parent: TransactionRef::genesis(),
            metagraph_id: None,
        };
        let unsigned = dagnet_core::Envelope::unsigned(value);

        let mock = MockTransport::new();
        let err = client(mock.clone()).submit(&unsigned).await.unwrap_err();
        assert!(matches!(err, NetworkError::Validation(_)));
        assert!(mock.requests().is_empty(), "no request should be made");
    }

    #[tokio::test]
    async fn test_data_submission_routes_to_metagraph_endpoint() {
        let account = Account::generate().unwrap();
        let metagraph: MetagraphId = addr(9).into();
        let value = dagnet_core::TransactionValue::DataSubmission {
            source: account.address().clone(),
            fee: 0,
            salt: 3,
            parent: TransactionRef::genesis(),
            metagraph_id: metagraph.clone(),
            data: json!({"k": "v"}),
            timestamp: 1_700_000_000_000,
        };
        let signed = account
            .sign_envelope(&dagnet_core::Envelope::unsigned(value))
            .unwrap();

        let mock = MockTransport::new();
        mock.push_json(200, json!({"hash": "dd".repeat(32)}));

        let hash = client(mock.clone()).submit(&signed).await.unwrap();
        assert_eq!(hash, "dd".repeat(32));
        assert!(mock.requests()[0]
            .url
            .ends_with(&format!("/metagraph/{metagraph}/data")));
    }

    #[tokio::test]
    async fn test_metagraph_reads() {
        let mock = MockTransport::new();
        mock.route_json("/metagraph/", 200, json!({"balance": 42, "ordinal": 1}));

        let c = client(mock.clone());
        let id: MetagraphId = addr(9).into();
        let info = c.metagraph_balance(&id, &addr(1)).await.unwrap();
        assert_eq!(info.balance, 42);

        let url = &mock.requests()[0].url;
        assert!(url.contains(&format!("/metagraph/{id}/addresses/")));
    }
}
