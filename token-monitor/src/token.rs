//! Outward-facing token record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use creation_decoder::CreationEvent;

/// Decimal places of launched tokens
pub const TOKEN_DECIMALS: i32 = 6;

/// Decimal places of the native currency (lamports per SOL)
pub const SOL_DECIMALS: i32 = 9;

/// A detected token as handed to application callbacks and browser clients.
///
/// Built exactly once from a [`CreationEvent`]; this is where raw on-chain
/// amounts are scaled to human units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub mint: String,
    pub bonding_curve: String,
    pub user: String,
    pub creator: String,
    pub timestamp: i64,
    pub virtual_token_reserves: f64,
    pub virtual_sol_reserves: f64,
    pub real_token_reserves: f64,
    pub token_total_supply: f64,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub price_usd: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn from_event(event: CreationEvent, created_at: DateTime<Utc>) -> Self {
        Self {
            mint: event.mint.to_string(),
            bonding_curve: event.bonding_curve.to_string(),
            user: event.user.to_string(),
            creator: event.creator.to_string(),
            name: event.name,
            symbol: event.symbol,
            uri: event.uri,
            timestamp: event.timestamp,
            virtual_token_reserves: scale(event.virtual_token_reserves, TOKEN_DECIMALS),
            virtual_sol_reserves: scale(event.virtual_sol_reserves, SOL_DECIMALS),
            real_token_reserves: scale(event.real_token_reserves, TOKEN_DECIMALS),
            token_total_supply: scale(event.token_total_supply, TOKEN_DECIMALS),
            market_cap: None,
            price_usd: None,
            created_at,
        }
    }
}

fn scale(raw: u64, decimals: i32) -> f64 {
    raw as f64 / 10f64.powi(decimals)
}
