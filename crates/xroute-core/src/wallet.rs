//! Wallet collaborator boundary
//!
//! The core never signs. It resolves addresses and hands finished swap
//! instructions to a [`Wallet`]. [`WalletView`] is the stock implementation:
//! an immutable set of per-chain clients where adding or removing a chain
//! produces a new view.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::amount::{BaseAmount, CryptoAmount};
use crate::errors::WalletError;
use crate::types::{Asset, Chain, TxHash};

/// A protocol-native deposit (e.g. a deposit message on the settlement chain)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositParams {
    /// Chain that executes the deposit message
    pub chain: Chain,
    pub amount: CryptoAmount,
    pub memo: String,
}

/// A transfer to `recipient`, carrying `memo` when non-empty.
///
/// With `router` set the funds go through the router contract's
/// deposit-with-expiry call, on behalf of the `recipient` vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub amount: CryptoAmount,
    pub recipient: String,
    pub memo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<RouterDeposit>,
}

/// Router contract call wrapping an inbound deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterDeposit {
    pub router: String,
    /// Unix time in seconds after which the router refuses the deposit
    pub expiry: u64,
}

/// Allowance granted to a router over a contract token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveParams {
    pub asset: Asset,
    /// `None` approves the maximum amount
    pub amount: Option<BaseAmount>,
    pub spender: String,
}

/// Whether `owner` lets `spender` move at least `amount`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceQuery {
    pub amount: CryptoAmount,
    pub owner: String,
    pub spender: String,
}

#[async_trait]
pub trait Wallet: Send + Sync {
    async fn address(&self, chain: &Chain) -> Result<String, WalletError>;

    async fn deposit(&self, params: DepositParams) -> Result<TxHash, WalletError>;

    async fn transfer(&self, params: TransferParams) -> Result<TxHash, WalletError>;

    async fn is_approved(&self, query: AllowanceQuery) -> Result<bool, WalletError> {
        Err(no_allowances(query.amount.asset.chain()))
    }

    async fn approve(&self, params: ApproveParams) -> Result<TxHash, WalletError> {
        Err(no_allowances(params.asset.chain()))
    }

    fn explorer_tx_url(&self, chain: &Chain, hash: &TxHash) -> Result<String, WalletError>;
}

fn no_allowances(chain: &Chain) -> WalletError {
    WalletError::Rejected {
        message: format!("{} does not support token allowances", chain),
    }
}

/// Signing and broadcasting for one chain
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain(&self) -> Chain;

    async fn address(&self) -> Result<String, WalletError>;

    async fn deposit(&self, _params: &DepositParams) -> Result<TxHash, WalletError> {
        Err(WalletError::Rejected {
            message: format!("{} does not support deposit messages", self.chain()),
        })
    }

    async fn transfer(&self, params: &TransferParams) -> Result<TxHash, WalletError>;

    async fn is_approved(&self, _query: &AllowanceQuery) -> Result<bool, WalletError> {
        Err(no_allowances(&self.chain()))
    }

    async fn approve(&self, _params: &ApproveParams) -> Result<TxHash, WalletError> {
        Err(no_allowances(&self.chain()))
    }

    fn explorer_tx_url(&self, hash: &TxHash) -> String;
}

/// Immutable per-chain client registry
#[derive(Clone, Default)]
pub struct WalletView {
    clients: Arc<BTreeMap<Chain, Arc<dyn ChainClient>>>,
}

impl WalletView {
    pub fn new(clients: impl IntoIterator<Item = Arc<dyn ChainClient>>) -> Self {
        let clients = clients
            .into_iter()
            .map(|client| (client.chain(), client))
            .collect();
        Self {
            clients: Arc::new(clients),
        }
    }

    /// New view with `client` added (replacing any client for the same chain)
    pub fn with_client(&self, client: Arc<dyn ChainClient>) -> Self {
        let mut clients = (*self.clients).clone();
        clients.insert(client.chain(), client);
        Self {
            clients: Arc::new(clients),
        }
    }

    /// New view without the client for `chain`
    pub fn without_chain(&self, chain: &Chain) -> Self {
        let mut clients = (*self.clients).clone();
        clients.remove(chain);
        Self {
            clients: Arc::new(clients),
        }
    }

    pub fn chains(&self) -> Vec<Chain> {
        self.clients.keys().cloned().collect()
    }

    fn client(&self, chain: &Chain) -> Result<&Arc<dyn ChainClient>, WalletError> {
        self.clients
            .get(chain)
            .ok_or_else(|| WalletError::ChainNotConfigured {
                chain: chain.to_string(),
            })
    }
}

impl std::fmt::Debug for WalletView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletView")
            .field("chains", &self.chains())
            .finish()
    }
}

#[async_trait]
impl Wallet for WalletView {
    async fn address(&self, chain: &Chain) -> Result<String, WalletError> {
        self.client(chain)?.address().await
    }

    async fn deposit(&self, params: DepositParams) -> Result<TxHash, WalletError> {
        self.client(&params.chain)?.deposit(&params).await
    }

    async fn transfer(&self, params: TransferParams) -> Result<TxHash, WalletError> {
        self.client(params.amount.asset.chain())?
            .transfer(&params)
            .await
    }

    async fn is_approved(&self, query: AllowanceQuery) -> Result<bool, WalletError> {
        self.client(query.amount.asset.chain())?
            .is_approved(&query)
            .await
    }

    async fn approve(&self, params: ApproveParams) -> Result<TxHash, WalletError> {
        self.client(params.asset.chain())?.approve(&params).await
    }

    fn explorer_tx_url(&self, chain: &Chain, hash: &TxHash) -> Result<String, WalletError> {
        Ok(self.client(chain)?.explorer_tx_url(hash))
    }
}
