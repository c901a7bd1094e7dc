//! Token-creation event record and its binary layout
//!
//! The layout is consumed strictly in order, all integers little-endian:
//!
//! | field                    | encoding                      |
//! |--------------------------|-------------------------------|
//! | discriminator            | 8 opaque bytes                |
//! | name, symbol, uri        | `u32` length + bytes, each    |
//! | mint, bonding_curve      | 32 bytes each                 |
//! | user, creator            | 32 bytes each                 |
//! | timestamp                | `i64`                         |
//! | virtual_token_reserves   | `u64`                         |
//! | virtual_sol_reserves     | `u64`                         |
//! | real_token_reserves      | `u64`                         |
//! | token_total_supply       | `u64`                         |

use serde::{Deserialize, Serialize};

use crate::address::{Address, ADDRESS_LEN};
use crate::error::{DecodeError, DecodeResult};

/// Size of the opaque record-type prefix
pub const DISCRIMINATOR_LEN: usize = 8;

/// Smallest buffer that can hold a creation event (all three strings empty)
pub const MIN_CREATE_EVENT_SIZE: usize = DISCRIMINATOR_LEN + 3 * 4 + 4 * ADDRESS_LEN + 8 + 4 * 8;

/// Decoded form of one on-chain token-creation instruction.
///
/// Reserve and supply amounts are raw on-chain integers; scaling them to
/// human units is left to whoever builds the outward-facing record.
///
/// Fields are public so fixtures and captured events can be built directly.
/// On the live path an event only ever comes out of [`decode`], which either
/// consumes the whole layout or fails; nothing downstream re-validates a
/// hand-built value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationEvent {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub mint: Address,
    pub bonding_curve: Address,
    pub user: Address,
    pub creator: Address,
    pub timestamp: i64,
    pub virtual_token_reserves: u64,
    pub virtual_sol_reserves: u64,
    pub real_token_reserves: u64,
    pub token_total_supply: u64,
}

/// Decode a creation event from its raw bytes.
///
/// Either the whole layout is consumed and a record is returned, or a
/// [`DecodeError`] describes the first field that could not be read.
/// Trailing bytes after `token_total_supply` are ignored.
pub fn decode(data: &[u8]) -> DecodeResult<CreationEvent> {
    if data.len() < MIN_CREATE_EVENT_SIZE {
        return Err(DecodeError::TooShort {
            len: data.len(),
            min: MIN_CREATE_EVENT_SIZE,
        });
    }

    let mut reader = Reader::new(data);
    reader.skip("discriminator", DISCRIMINATOR_LEN)?;

    let name = reader.read_string("name")?;
    let symbol = reader.read_string("symbol")?;
    let uri = reader.read_string("uri")?;
    let mint = reader.read_address("mint")?;
    let bonding_curve = reader.read_address("bonding_curve")?;
    let user = reader.read_address("user")?;
    let creator = reader.read_address("creator")?;
    let timestamp = i64::from_le_bytes(reader.read_array("timestamp")?);
    let virtual_token_reserves = reader.read_u64("virtual_token_reserves")?;
    let virtual_sol_reserves = reader.read_u64("virtual_sol_reserves")?;
    let real_token_reserves = reader.read_u64("real_token_reserves")?;
    let token_total_supply = reader.read_u64("token_total_supply")?;

    Ok(CreationEvent {
        name,
        symbol,
        uri,
        mint,
        bonding_curve,
        user,
        creator,
        timestamp,
        virtual_token_reserves,
        virtual_sol_reserves,
        real_token_reserves,
        token_total_supply,
    })
}

/// Write an event back into the on-chain layout.
///
/// Used to build fixtures and to replay captured events through the decoder.
pub fn encode(event: &CreationEvent, discriminator: [u8; DISCRIMINATOR_LEN]) -> Vec<u8> {
    let strings_len = event.name.len() + event.symbol.len() + event.uri.len();
    let mut out = Vec::with_capacity(MIN_CREATE_EVENT_SIZE + strings_len);

    out.extend_from_slice(&discriminator);
    for text in [&event.name, &event.symbol, &event.uri] {
        out.extend_from_slice(&(text.len() as u32).to_le_bytes());
        out.extend_from_slice(text.as_bytes());
    }
    for address in [&event.mint, &event.bonding_curve, &event.user, &event.creator] {
        out.extend_from_slice(address.as_bytes());
    }
    out.extend_from_slice(&event.timestamp.to_le_bytes());
    for amount in [
        event.virtual_token_reserves,
        event.virtual_sol_reserves,
        event.real_token_reserves,
        event.token_total_supply,
    ] {
        out.extend_from_slice(&amount.to_le_bytes());
    }

    out
}

/// Bounds-checked cursor over the event bytes
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, field: &'static str, len: usize) -> DecodeResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(DecodeError::UnexpectedEof {
                field,
                offset: self.offset,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn skip(&mut self, field: &'static str, len: usize) -> DecodeResult<()> {
        self.take(field, len).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self, field: &'static str) -> DecodeResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    fn read_u64(&mut self, field: &'static str) -> DecodeResult<u64> {
        self.read_array(field).map(u64::from_le_bytes)
    }

    fn read_address(&mut self, field: &'static str) -> DecodeResult<Address> {
        self.read_array::<ADDRESS_LEN>(field).map(Address::new)
    }

    fn read_string(&mut self, field: &'static str) -> DecodeResult<String> {
        let declared = u32::from_le_bytes(self.read_array(field)?) as usize;
        if declared > self.remaining() {
            return Err(DecodeError::InvalidStringLength {
                field,
                declared,
                remaining: self.remaining(),
            });
        }
        let raw = self.take(field, declared)?;
        Ok(String::from_utf8_lossy(raw).trim_end_matches('\0').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> CreationEvent {
        CreationEvent {
            name: "Doge Moon".to_string(),
            symbol: "DMOON".to_string(),
            uri: "https://ipfs.io/ipfs/QmSample".to_string(),
            mint: Address::new([1; 32]),
            bonding_curve: Address::new([2; 32]),
            user: Address::new([3; 32]),
            creator: Address::new([4; 32]),
            timestamp: 1_717_171_717,
            virtual_token_reserves: 1_073_000_000_000_000,
            virtual_sol_reserves: 30_000_000_000,
            real_token_reserves: 793_100_000_000_000,
            token_total_supply: 1_000_000_000_000_000,
        }
    }

    #[test]
    fn test_min_size_matches_layout() {
        assert_eq!(MIN_CREATE_EVENT_SIZE, 188);
    }

    #[test]
    fn test_decode_encoded_event() {
        let event = sample_event();
        let bytes = encode(&event, [0xAA; 8]);
        assert_eq!(decode(&bytes).unwrap(), event);
    }

    #[test]
    fn test_discriminator_not_validated() {
        let event = sample_event();
        let a = decode(&encode(&event, [0; 8])).unwrap();
        let b = decode(&encode(&event, [0xFF; 8])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_trailing_nuls_stripped() {
        let mut event = sample_event();
        event.symbol = "PAD\0\0\0".to_string();
        let decoded = decode(&encode(&event, [0; 8])).unwrap();
        assert_eq!(decoded.symbol, "PAD");
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let event = sample_event();
        let mut bytes = encode(&event, [0; 8]);
        // First byte of the name text sits right after the discriminator and length prefix
        bytes[12] = 0xFF;
        let decoded = decode(&bytes).unwrap();
        assert!(decoded.name.starts_with('\u{FFFD}'));
        assert_eq!(decoded.symbol, "DMOON");
    }

    #[test]
    fn test_short_buffer_rejected_without_parsing() {
        let err = decode(&[0u8; 187]).unwrap_err();
        assert_eq!(err, DecodeError::TooShort { len: 187, min: 188 });
    }

    #[test]
    fn test_string_length_past_end() {
        let mut bytes = encode(&sample_event(), [0; 8]);
        bytes[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidStringLength { field: "name", .. }
        ));
    }

    #[test]
    fn test_truncated_tail() {
        let bytes = encode(&sample_event(), [0; 8]);
        let err = decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnexpectedEof {
                field: "token_total_supply",
                needed: 8,
                remaining: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let event = sample_event();
        let mut bytes = encode(&event, [0; 8]);
        bytes.extend_from_slice(&[9; 16]);
        assert_eq!(decode(&bytes).unwrap(), event);
    }
}
