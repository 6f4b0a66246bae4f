use crate::group;
use num_bigint_dig::BigUint;
use num_traits::One;
use rand::{CryptoRng, Rng};

/// An arbiter's ElGamal keypair over the election group.
#[derive(Debug, Clone)]
pub struct ElGamalKeypair {
    /// `sk in [1, q)`, held only by the arbiter process.
    pub secret: BigUint,
    /// `pk = g^sk mod p`, published.
    pub public: BigUint,
}

/// Sample a fresh arbiter keypair.
pub fn generate_keypair<R: Rng + CryptoRng>(rng: &mut R) -> ElGamalKeypair {
    let grp = group();
    let secret = grp.rand_scalar(rng);
    let public = grp.pow_g(&secret);
    ElGamalKeypair { secret, public }
}

/// The election public key is the product of all arbiter public keys, so
/// decryption needs every arbiter's cooperation.
pub fn election_key<'a>(arbiter_keys: impl IntoIterator<Item = &'a BigUint>) -> BigUint {
    let grp = group();
    arbiter_keys
        .into_iter()
        .fold(BigUint::one(), |acc, pk| grp.mul(&acc, pk))
}
