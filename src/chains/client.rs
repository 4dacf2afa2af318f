//! On-chain client seams
//!
//! The scanner and executor consume two capability traits so tests (and the
//! simulate mode) can swap the real ethers-backed client for a double.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::contract::ContractError;
use ethers::middleware::SignerMiddleware;
use ethers::prelude::abigen;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};

use crate::config::ChainConfig;
use crate::error::{BotError, QuoteError, Result};
use crate::types::SwapOutcome;

abigen!(
    IQuoter,
    r#"[
        function quoteExactInputSingle(address tokenIn, address tokenOut, uint24 fee, uint256 amountIn, uint160 sqrtPriceLimitX96) external returns (uint256 amountOut)
    ]"#
);

abigen!(
    ISwapRouter,
    r#"[
        struct ExactInputSingleParams { address tokenIn; address tokenOut; uint24 fee; address recipient; uint256 deadline; uint256 amountIn; uint256 amountOutMinimum; uint160 sqrtPriceLimitX96; }
        function exactInputSingle(ExactInputSingleParams params) external payable returns (uint256 amountOut)
    ]"#
);

abigen!(
    IWrappedNative,
    r#"[
        function deposit() external payable
        function withdraw(uint256 wad) external
        function approve(address spender, uint256 amount) external returns (bool)
        function allowance(address owner, address spender) external view returns (uint256)
        function balanceOf(address account) external view returns (uint256)
    ]"#
);

abigen!(
    IERC20,
    r#"[
        function approve(address spender, uint256 amount) external returns (bool)
        function allowance(address owner, address spender) external view returns (uint256)
        function balanceOf(address account) external view returns (uint256)
    ]"#
);

/// Read-only quoting capability.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn gas_price(&self) -> Result<U256>;

    /// Estimate the output of a hypothetical single-hop swap.
    async fn quote(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        fee: u32,
    ) -> Result<U256, QuoteError>;
}

/// State-changing trade capability: submit, wait for inclusion, read gas.
#[async_trait]
pub trait TradeSubmitter: Send + Sync {
    async fn native_balance(&self) -> Result<U256>;

    async fn token_balance(&self, token: Address) -> Result<U256>;

    /// Wrap native currency; returns gas used.
    async fn wrap_native(&self, amount: U256) -> Result<U256>;

    /// Approve the router for unlimited spend when the current allowance is
    /// below `amount`; returns gas used (zero when already approved).
    async fn ensure_allowance(&self, token: Address, amount: U256) -> Result<U256>;

    async fn swap(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
        min_out: U256,
    ) -> Result<SwapOutcome>;
}

type EvmMiddleware = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Real chain client: one signer-bound connection plus the three contract
/// handles the bot touches.
pub struct EvmChainClient {
    chain: ChainConfig,
    client: Arc<EvmMiddleware>,
    wallet_address: Address,
    quoter: IQuoter<EvmMiddleware>,
    router: ISwapRouter<EvmMiddleware>,
}

impl EvmChainClient {
    pub fn new(
        chain: ChainConfig,
        provider: Provider<Http>,
        wallet: LocalWallet,
        wallet_address: Address,
    ) -> Self {
        let wallet = wallet.with_chain_id(chain.chain_id);
        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let quoter = IQuoter::new(chain.quoter, client.clone());
        let router = ISwapRouter::new(chain.router, client.clone());
        Self {
            chain,
            client,
            wallet_address,
            quoter,
            router,
        }
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    fn erc20(&self, token: Address) -> IERC20<EvmMiddleware> {
        IERC20::new(token, self.client.clone())
    }

    fn wrapped(&self) -> IWrappedNative<EvmMiddleware> {
        IWrappedNative::new(self.chain.wrapped_native, self.client.clone())
    }

    fn classify_quote_error(e: ContractError<EvmMiddleware>, fee: u32) -> QuoteError {
        // Quoting a pool that does not exist reverts; anything else is
        // transport-level.
        if e.is_revert() {
            QuoteError::PoolAbsent { fee }
        } else {
            QuoteError::Rpc(e.to_string())
        }
    }
}

fn rpc_err<E: std::fmt::Display>(e: E) -> BotError {
    BotError::Rpc(e.to_string())
}

fn exec_err<E: std::fmt::Display>(e: E) -> BotError {
    BotError::Execution(e.to_string())
}

fn check_receipt(
    receipt: Option<ethers::types::TransactionReceipt>,
    what: &str,
) -> Result<ethers::types::TransactionReceipt> {
    let receipt = receipt.ok_or_else(|| BotError::Execution(format!("{what}: transaction dropped")))?;
    if receipt.status != Some(1.into()) {
        return Err(BotError::Execution(format!(
            "{what}: transaction {:?} reverted",
            receipt.transaction_hash
        )));
    }
    Ok(receipt)
}

#[async_trait]
impl QuoteProvider for EvmChainClient {
    async fn gas_price(&self) -> Result<U256> {
        self.client.get_gas_price().await.map_err(rpc_err)
    }

    async fn quote(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        fee: u32,
    ) -> Result<U256, QuoteError> {
        self.quoter
            .quote_exact_input_single(token_in, token_out, fee, amount_in, U256::zero())
            .call()
            .await
            .map_err(|e| Self::classify_quote_error(e, fee))
    }
}

#[async_trait]
impl TradeSubmitter for EvmChainClient {
    async fn native_balance(&self) -> Result<U256> {
        self.client
            .get_balance(self.wallet_address, None)
            .await
            .map_err(rpc_err)
    }

    async fn token_balance(&self, token: Address) -> Result<U256> {
        self.erc20(token)
            .balance_of(self.wallet_address)
            .call()
            .await
            .map_err(rpc_err)
    }

    async fn wrap_native(&self, amount: U256) -> Result<U256> {
        let call = self.wrapped().deposit().value(amount);
        let pending = call.send().await.map_err(exec_err)?;
        let receipt = check_receipt(pending.await.map_err(exec_err)?, "wrap")?;
        tracing::debug!(chain = %self.chain.name, tx = ?receipt.transaction_hash, "wrapped {amount} wei");
        Ok(receipt.gas_used.unwrap_or_default())
    }

    async fn ensure_allowance(&self, token: Address, amount: U256) -> Result<U256> {
        let erc20 = self.erc20(token);
        let allowance = erc20
            .allowance(self.wallet_address, self.chain.router)
            .call()
            .await
            .map_err(rpc_err)?;
        if allowance >= amount {
            return Ok(U256::zero());
        }

        tracing::info!(chain = %self.chain.name, %token, "approving router for unlimited spend");
        let call = erc20.approve(self.chain.router, U256::MAX);
        let pending = call.send().await.map_err(exec_err)?;
        let receipt = check_receipt(pending.await.map_err(exec_err)?, "approve")?;
        Ok(receipt.gas_used.unwrap_or_default())
    }

    async fn swap(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
        min_out: U256,
    ) -> Result<SwapOutcome> {
        let deadline = U256::from(chrono::Utc::now().timestamp() as u64 + 300);
        let params = ExactInputSingleParams {
            token_in,
            token_out,
            fee,
            recipient: self.wallet_address,
            deadline,
            amount_in,
            amount_out_minimum: min_out,
            sqrt_price_limit_x96: U256::zero(),
        };

        let call = self.router.exact_input_single(params);
        let pending = call.send().await.map_err(exec_err)?;
        let receipt = check_receipt(pending.await.map_err(exec_err)?, "swap")?;

        tracing::info!(
            chain = %self.chain.name,
            tx = ?receipt.transaction_hash,
            "swap {amount_in} in (fee {fee}) confirmed"
        );

        Ok(SwapOutcome {
            tx_hash: receipt.transaction_hash,
            gas_used: receipt.gas_used.unwrap_or_default(),
        })
    }
}
