//! Personal-message signature verification.
//!
//! Every signed action in the product uses the fixed message shape
//! `"I {action} on TippinBit"`, signed with the standard Ethereum
//! personal-message scheme. Verification recovers the signer from the
//! signature and compares checksummed addresses; malformed input of any kind
//! yields `false`, never an error escape.

use crate::domain::{Address, Username};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

/// Build the canonical action message, e.g. `action = "claim @alice"`.
pub fn action_message(action: &str) -> String {
    format!("I {} on TippinBit", action)
}

/// The exact message a wallet must sign to claim a username.
pub fn claim_message(username: &Username) -> String {
    action_message(&format!("claim @{}", username))
}

/// Verify a personal-message signature against an expected signer address.
pub fn verify_personal_signature(message: &str, signature_hex: &str, expected: &str) -> bool {
    let Ok(expected) = Address::parse(expected) else {
        return false;
    };
    let Some(recovered) = recover_signer(message, signature_hex) else {
        return false;
    };
    recovered == expected
}

/// Recover the checksummed signer address, or `None` on any malformed input.
pub fn recover_signer(message: &str, signature_hex: &str) -> Option<Address> {
    let raw = signature_hex.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(raw).ok()?;
    if bytes.len() != 65 {
        return None;
    }

    let recovery_byte = match bytes[64] {
        v @ 0..=1 => v,
        v @ 27..=28 => v - 27,
        _ => return None,
    };
    let recovery_id = RecoveryId::from_byte(recovery_byte)?;
    let signature = Signature::from_slice(&bytes[..64]).ok()?;

    let digest = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id).ok()?;
    Some(address_of(&key))
}

/// EIP-191: keccak256("\x19Ethereum Signed Message:\n" + len + message).
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let mut hasher = Keccak256::new();
    hasher.update(&point.as_bytes()[1..]);
    let hash = hasher.finalize();
    let hex_body = hex::encode(&hash[12..]);
    Address::parse(&format!("0x{}", hex_body)).expect("derived address is well-formed")
}
