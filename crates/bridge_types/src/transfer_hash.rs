#[cfg(test)]
#[path = "transfer_hash_test.rs"]
mod transfer_hash_test;

use alloy_primitives::{keccak256, B256};

/// The stable identity of a transfer across both chains:
/// `keccak256(transaction_hash || minimal_big_endian(log_index))`.
pub fn compute_transfer_hash(transaction_hash: B256, log_index: u64) -> B256 {
    let mut preimage = Vec::with_capacity(B256::len_bytes() + 8);
    preimage.extend_from_slice(transaction_hash.as_slice());
    preimage.extend_from_slice(&minimal_big_endian(log_index));
    keccak256(&preimage)
}

/// Shortest big-endian encoding of `value`; zero encodes to the empty string.
pub fn minimal_big_endian(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let leading_zeros = bytes.iter().take_while(|byte| **byte == 0).count();
    bytes[leading_zeros..].to_vec()
}
