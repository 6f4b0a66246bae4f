use crate::group;
use num_bigint_dig::BigUint;
use sha2::{Digest, Sha256};

// Fiat-Shamir challenges for the two proof systems. The domains must never
// collide, so each transcript is prefixed with its own ASCII tag and every
// integer is length-prefixed before hashing.
const VOTE_ZKP_DOMAIN: &[u8] = b"blindtally-vote-zkp-v1";
const DEC_ZKP_DOMAIN: &[u8] = b"blindtally-dec-zkp-v1";

fn challenge(domain: &[u8], transcript: &[&BigUint]) -> BigUint {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for value in transcript {
        let bytes = value.to_bytes_be();
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(&bytes);
    }
    BigUint::from_bytes_be(&hasher.finalize()) % &group().order
}

/// Challenge for the disjunctive ballot proof:
/// `H(pk, a, b, a0, b0, a1, b1) mod q`.
pub fn hash_vote_zkp(
    pk: &BigUint,
    a: &BigUint,
    b: &BigUint,
    a0: &BigUint,
    b0: &BigUint,
    a1: &BigUint,
    b1: &BigUint,
) -> BigUint {
    challenge(VOTE_ZKP_DOMAIN, &[pk, a, b, a0, b0, a1, b1])
}

/// Challenge for the partial-decryption equality proof:
/// `H(pk_i, a, b, u, v) mod q`.
pub fn hash_dec_zkp(pk_i: &BigUint, a: &BigUint, b: &BigUint, u: &BigUint, v: &BigUint) -> BigUint {
    challenge(DEC_ZKP_DOMAIN, &[pk_i, a, b, u, v])
}
