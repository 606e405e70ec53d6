//! Registry contract ABI encoding
//!
//! Four calls are used:
//! 1. getLocks(address)               -> (address,uint256,uint256,bool)[]
//! 2. approve(address,uint256)        on the token contract
//! 3. lock(address,uint256,uint256)   on the registry
//! 4. withdraw(uint256)               on the registry

use num_bigint::BigUint;
use tokenlock_core::{Address, Lock, LockIndex, RegistryError, UnixSeconds};

/// `keccak256("getLocks(address)")[..4]`
pub const GET_LOCKS_SELECTOR: [u8; 4] = [0x71, 0x9f, 0x30, 0x89];

/// `keccak256("approve(address,uint256)")[..4]`
pub const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

/// `keccak256("lock(address,uint256,uint256)")[..4]`
pub const LOCK_SELECTOR: [u8; 4] = [0xe2, 0xab, 0x69, 0x1d];

/// `keccak256("withdraw(uint256)")[..4]`
pub const WITHDRAW_SELECTOR: [u8; 4] = [0x2e, 0x1a, 0x7d, 0x4d];

const WORD: usize = 32;

/// Words per encoded lock tuple
const LOCK_TUPLE_WORDS: usize = 4;

// =============================================================================
// Encoding
// =============================================================================

pub fn encode_get_locks(owner: &Address) -> Vec<u8> {
    let mut data = GET_LOCKS_SELECTOR.to_vec();
    data.extend_from_slice(&address_word(owner));
    data
}

pub fn encode_approve(spender: &Address, amount: &BigUint) -> Result<Vec<u8>, RegistryError> {
    let mut data = APPROVE_SELECTOR.to_vec();
    data.extend_from_slice(&address_word(spender));
    data.extend_from_slice(&uint_word(amount)?);
    Ok(data)
}

pub fn encode_lock(
    token: &Address,
    amount: &BigUint,
    unlock_time: UnixSeconds,
) -> Result<Vec<u8>, RegistryError> {
    let mut data = LOCK_SELECTOR.to_vec();
    data.extend_from_slice(&address_word(token));
    data.extend_from_slice(&uint_word(amount)?);
    data.extend_from_slice(&u64_word(unlock_time));
    Ok(data)
}

pub fn encode_withdraw(index: LockIndex) -> Vec<u8> {
    let mut data = WITHDRAW_SELECTOR.to_vec();
    data.extend_from_slice(&u64_word(index));
    data
}

fn address_word(addr: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - Address::LEN..].copy_from_slice(&addr.to_bytes());
    word
}

fn u64_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

fn uint_word(value: &BigUint) -> Result<[u8; WORD], RegistryError> {
    let bytes = value.to_bytes_be();
    if bytes.len() > WORD {
        return Err(RegistryError::remote_call(format!(
            "amount {} does not fit in uint256",
            value
        )));
    }
    let mut word = [0u8; WORD];
    word[WORD - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode the return data of `getLocks(address)`.
///
/// Layout: head word with the array offset, then the length word, then one
/// inline 4-word tuple per lock.
pub fn decode_locks(data: &[u8]) -> Result<Vec<Lock>, RegistryError> {
    let offset = word_as_usize(data, 0)?;
    let count = word_as_usize(data, offset)?;

    let body_start = offset
        .checked_add(WORD)
        .ok_or_else(|| malformed("array offset overflows"))?;
    let body_len = count
        .checked_mul(LOCK_TUPLE_WORDS * WORD)
        .ok_or_else(|| malformed("array length overflows"))?;
    let body_end = body_start
        .checked_add(body_len)
        .ok_or_else(|| malformed("array length overflows"))?;
    if data.len() < body_end {
        return Err(malformed(&format!(
            "expected {} bytes for {} locks, got {}",
            body_end,
            count,
            data.len()
        )));
    }

    let locks = data[body_start..body_end]
        .chunks_exact(LOCK_TUPLE_WORDS * WORD)
        .map(|tuple| {
            let mut token = [0u8; Address::LEN];
            token.copy_from_slice(&tuple[WORD - Address::LEN..WORD]);
            Lock {
                token: Address::from_bytes(token),
                amount: BigUint::from_bytes_be(&tuple[WORD..2 * WORD]),
                unlock_time: word_as_u64_saturating(&tuple[2 * WORD..3 * WORD]),
                withdrawn: tuple[3 * WORD..4 * WORD].iter().any(|&b| b != 0),
            }
        })
        .collect();

    Ok(locks)
}

/// Read a word that must hold a small integer (offset or length)
fn word_as_usize(data: &[u8], at: usize) -> Result<usize, RegistryError> {
    let word = at
        .checked_add(WORD)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| malformed(&format!("truncated at byte {}", at)))?;

    if word[..WORD - 8].iter().any(|&b| b != 0) {
        return Err(malformed(&format!("word at byte {} is too large", at)));
    }
    let mut be = [0u8; 8];
    be.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(be)).map_err(|_| malformed("word exceeds usize"))
}

/// Timestamps beyond u64 saturate; such a lock never matures in practice
fn word_as_u64_saturating(word: &[u8]) -> u64 {
    if word[..WORD - 8].iter().any(|&b| b != 0) {
        return u64::MAX;
    }
    let mut be = [0u8; 8];
    be.copy_from_slice(&word[WORD - 8..]);
    u64::from_be_bytes(be)
}

fn malformed(detail: &str) -> RegistryError {
    RegistryError::remote_call(format!("malformed getLocks response: {}", detail))
}

// =============================================================================
// Hex data helpers
// =============================================================================

pub fn to_hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn from_hex_data(data: &str) -> Result<Vec<u8>, RegistryError> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(digits)
        .map_err(|e| RegistryError::remote_call(format!("invalid hex data from node: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; Address::LEN];
        bytes[Address::LEN - 1] = last;
        Address::from_bytes(bytes)
    }

    fn word_hex(value: u64) -> String {
        format!("{:064x}", value)
    }

    #[test]
    fn test_encode_withdraw() {
        let data = encode_withdraw(2);
        assert_eq!(
            to_hex_data(&data),
            format!("0x2e1a7d4d{}", word_hex(2))
        );
    }

    #[test]
    fn test_encode_approve() {
        let amount = BigUint::from(1_500_000_000_000_000_000u64);
        let data = encode_approve(&addr(0xaa), &amount).unwrap();
        assert_eq!(data.len(), 4 + 2 * WORD);
        assert_eq!(&data[..4], &APPROVE_SELECTOR);
        assert_eq!(data[4 + WORD - 1], 0xaa);
        assert_eq!(
            hex::encode(&data[4 + WORD..]),
            word_hex(1_500_000_000_000_000_000)
        );
    }

    #[test]
    fn test_encode_lock_layout() {
        let data = encode_lock(&addr(0x01), &BigUint::from(5u32), 2_000).unwrap();
        let expected = format!(
            "0xe2ab691d{}{}{}",
            word_hex(1),
            word_hex(5),
            word_hex(2_000)
        );
        assert_eq!(to_hex_data(&data), expected);
    }

    #[test]
    fn test_amount_overflowing_uint256_rejected() {
        let too_big = BigUint::from(1u8) << 256;
        let err = encode_approve(&addr(1), &too_big).unwrap_err();
        assert_eq!(err.error_code(), "remote_call_error");
    }

    #[test]
    fn test_decode_locks() {
        let hex_data = [
            word_hex(0x20),
            word_hex(2),
            // lock 0
            word_hex(0xaa),
            word_hex(1_000),
            word_hex(1_700_000_000),
            word_hex(0),
            // lock 1
            word_hex(0xbb),
            word_hex(42),
            word_hex(1_000),
            word_hex(1),
        ]
        .concat();
        let locks = decode_locks(&from_hex_data(&hex_data).unwrap()).unwrap();

        assert_eq!(locks.len(), 2);
        assert_eq!(locks[0].token, addr(0xaa));
        assert_eq!(locks[0].amount, BigUint::from(1_000u32));
        assert_eq!(locks[0].unlock_time, 1_700_000_000);
        assert!(!locks[0].withdrawn);
        assert_eq!(locks[1].token, addr(0xbb));
        assert!(locks[1].withdrawn);
    }

    #[test]
    fn test_decode_empty_array() {
        let data = from_hex_data(&[word_hex(0x20), word_hex(0)].concat()).unwrap();
        assert!(decode_locks(&data).unwrap().is_empty());
    }

    #[test]
    fn test_decode_truncated() {
        let data = from_hex_data(&[word_hex(0x20), word_hex(1), word_hex(0xaa)].concat()).unwrap();
        let err = decode_locks(&data).unwrap_err();
        assert!(err.reason().contains("malformed getLocks response"));

        assert!(decode_locks(&[]).is_err());
    }

    #[test]
    fn test_decode_huge_unlock_time_saturates() {
        let data = from_hex_data(
            &[
                word_hex(0x20),
                word_hex(1),
                word_hex(0xaa),
                word_hex(1),
                "ff".repeat(WORD),
                word_hex(0),
            ]
            .concat(),
        )
        .unwrap();
        let locks = decode_locks(&data).unwrap();
        assert_eq!(locks[0].unlock_time, u64::MAX);
    }
}
