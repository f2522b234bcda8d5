use ethers::abi::{encode, Token};
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};

/// Pool identifier as carried on the readiness bus (0x-prefixed hex).
pub type PoolId = String;

/// Agent identifier.
pub type AgentId = String;

/// Encode a signed integer as a 256-bit two's complement ABI word.
fn signed_word(value: i128) -> Token {
    if value >= 0 {
        Token::Int(U256::from(value as u128))
    } else {
        // !(|v| - 1)
        Token::Int(U256::MAX - U256::from((-(value + 1)) as u128))
    }
}

/// Key of a settlement pool (currency pair, fee tier, tick spacing, hook contract)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolKey {
    pub currency0: Address,
    pub currency1: Address,
    pub fee: u32,
    #[serde(alias = "tick_spacing")]
    pub tick_spacing: i32,
    pub hooks: Address,
}

impl PoolKey {
    /// keccak256 of the ABI-encoded key.
    pub fn id_hash(&self) -> H256 {
        let encoded = encode(&[
            Token::Address(self.currency0),
            Token::Address(self.currency1),
            Token::Uint(U256::from(self.fee)),
            signed_word(self.tick_spacing as i128),
            Token::Address(self.hooks),
        ]);
        H256::from(keccak256(encoded))
    }

    /// Hex pool id used to key coordination and monitoring state.
    pub fn pool_id(&self) -> PoolId {
        format!("{:?}", self.id_hash())
    }
}

/// Disclosed trade parameters of a commitment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeIntent {
    pub user: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub recipient: Address,
    pub amount_in: i128,
    pub min_amount_out: i128,
    /// Unix seconds after which the intent may no longer execute
    pub deadline: u64,
    pub nonce: U256,
}

impl TradeIntent {
    /// Deterministic commitment hash of this intent.
    ///
    /// keccak256(abi.encode(user, tokenIn, tokenOut, amountIn, minAmountOut,
    /// recipient, nonce, deadline)). Revealing an intent whose hash differs
    /// from the stored commitment is rejected by validation.
    pub fn commitment_hash(&self) -> H256 {
        let encoded = encode(&[
            Token::Address(self.user),
            Token::Address(self.token_in),
            Token::Address(self.token_out),
            signed_word(self.amount_in),
            signed_word(self.min_amount_out),
            Token::Address(self.recipient),
            Token::Uint(self.nonce),
            Token::Uint(U256::from(self.deadline)),
        ]);
        H256::from(keccak256(encoded))
    }

    /// Address-like fields paired with their names, in validation order.
    pub fn address_fields(&self) -> [(&'static str, Address); 4] {
        [
            ("user", self.user),
            ("tokenIn", self.token_in),
            ("tokenOut", self.token_out),
            ("recipient", self.recipient),
        ]
    }
}

/// A commitment an agent has published, as handed to the reveal store in bulk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commitment {
    pub hash: H256,
    pub intent: TradeIntent,
    pub pool_id: PoolId,
    /// Already revealed by the caller; bulk collection skips these
    #[serde(default)]
    pub revealed: bool,
}

impl Commitment {
    /// Build a commitment whose hash binds the given intent.
    pub fn new(intent: TradeIntent, pool_id: impl Into<PoolId>) -> Self {
        Self {
            hash: intent.commitment_hash(),
            intent,
            pool_id: pool_id.into(),
            revealed: false,
        }
    }
}
