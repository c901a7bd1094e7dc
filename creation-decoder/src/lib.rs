//! # creation-decoder
//!
//! Pure decoding of token-creation events published by a bonding-curve
//! launch program.
//!
//! The crate has two layers, both free of I/O and state:
//!
//! - [`decode`] turns the raw bytes of one event into a [`CreationEvent`]
//! - [`extract_creation_event`] scans the log lines of one subscription push,
//!   picks out base64 `Program data:` payloads and decodes the first
//!   creation event it finds
//!
//! ## Usage
//!
//! ```rust
//! use creation_decoder::{decode, encode, Address, CreationEvent};
//!
//! let event = CreationEvent {
//!     name: "Example".to_string(),
//!     symbol: "EXM".to_string(),
//!     uri: "https://example.com/meta.json".to_string(),
//!     mint: Address::new([1; 32]),
//!     bonding_curve: Address::new([2; 32]),
//!     user: Address::new([3; 32]),
//!     creator: Address::new([3; 32]),
//!     timestamp: 1_700_000_000,
//!     virtual_token_reserves: 1_073_000_000_000_000,
//!     virtual_sol_reserves: 30_000_000_000,
//!     real_token_reserves: 793_100_000_000_000,
//!     token_total_supply: 1_000_000_000_000_000,
//! };
//!
//! let bytes = encode(&event, [0; 8]);
//! assert_eq!(decode(&bytes).unwrap(), event);
//! ```

pub mod address;
pub mod error;
pub mod event;
pub mod filter;

pub use address::{Address, ADDRESS_LEN};
pub use error::{DecodeError, DecodeResult};
pub use event::{decode, encode, CreationEvent, DISCRIMINATOR_LEN, MIN_CREATE_EVENT_SIZE};
pub use filter::{
    candidate_payloads, extract_creation_event, has_creation_marker, DATA_PREFIX,
    EXCLUDED_PREFIX, MINT_MARKER,
};
