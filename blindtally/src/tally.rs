use crate::{group, hash_dec_zkp, BallotCipher, ElGamalKeypair, Error};
use num_bigint_dig::BigUint;
use num_traits::One;
use rand::{CryptoRng, Rng};
use std::collections::HashMap;

/// One arbiter's contribution `d = A^sk_i` to decrypting an aggregated
/// ciphertext, published together with the aggregate it was computed for.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PartialDecryption {
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub d: BigUint,
    pub aggregate: BallotCipher,
}

/// Chaum-Pedersen proof that `log_g(pk_i) = log_A(d)`:
/// `(u, v, s) = (A^r, g^r, r + c*sk_i)`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DecryptionProof {
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub u: BigUint,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub v: BigUint,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub s: BigUint,
}

/// Multiply ciphertexts componentwise; the result encrypts the sum of the
/// underlying votes. An empty iterator yields the identity `(1, 1)`, an
/// encryption of zero with randomness zero.
pub fn combine_ciphers<'a>(ciphers: impl IntoIterator<Item = &'a BallotCipher>) -> BallotCipher {
    let grp = group();
    ciphers.into_iter().fold(
        BallotCipher {
            a: BigUint::one(),
            b: BigUint::one(),
        },
        |acc, c| BallotCipher {
            a: grp.mul(&acc.a, &c.a),
            b: grp.mul(&acc.b, &c.b),
        },
    )
}

/// Produce this arbiter's partial decryption of an aggregate ciphertext,
/// with a proof of correctness under its public key.
pub fn partial_decrypt<R: Rng + CryptoRng>(
    aggregate: &BallotCipher,
    keypair: &ElGamalKeypair,
    rng: &mut R,
) -> (PartialDecryption, DecryptionProof) {
    let grp = group();

    let d = grp.pow(&aggregate.a, &keypair.secret);

    let r = grp.rand_scalar(rng);
    let u = grp.pow(&aggregate.a, &r);
    let v = grp.pow_g(&r);
    let c = hash_dec_zkp(&keypair.public, &aggregate.a, &aggregate.b, &u, &v);
    let s = grp.add_scalar(&r, &grp.mul_scalar(&c, &keypair.secret));

    (
        PartialDecryption {
            d,
            aggregate: aggregate.clone(),
        },
        DecryptionProof { u, v, s },
    )
}

/// Check a partial-decryption proof under the publishing arbiter's key.
pub fn verify_partial(
    decryption: &PartialDecryption,
    proof: &DecryptionProof,
    arbiter_key: &BigUint,
) -> bool {
    let grp = group();
    let aggregate = &decryption.aggregate;

    for element in [&decryption.d, &proof.u, &proof.v, arbiter_key] {
        if !grp.contains(element) {
            return false;
        }
    }

    let c = hash_dec_zkp(arbiter_key, &aggregate.a, &aggregate.b, &proof.u, &proof.v);

    // A^s == u * d^c  and  g^s == v * pk_i^c
    if grp.pow(&aggregate.a, &proof.s) != grp.mul(&proof.u, &grp.pow(&decryption.d, &c)) {
        return false;
    }
    grp.pow_g(&proof.s) == grp.mul(&proof.v, &grp.pow(arbiter_key, &c))
}

/// Lookup table `{g^i : 0 <= i <= max}`, built once per recovery pass and
/// shared across candidate slots.
pub struct PowerTable {
    powers: HashMap<Vec<u8>, u64>,
}

impl PowerTable {
    pub fn new(max: u64) -> PowerTable {
        let grp = group();
        let mut powers = HashMap::with_capacity(max as usize + 1);
        let mut acc = BigUint::one();
        for i in 0..=max {
            powers.insert(acc.to_bytes_be(), i);
            acc = grp.mul(&acc, &grp.generator);
        }
        PowerTable { powers }
    }

    pub fn lookup(&self, value: &BigUint) -> Option<u64> {
        self.powers.get(&value.to_bytes_be()).copied()
    }
}

/// Recover the plaintext count from an aggregate ciphertext and every
/// arbiter's partial decryption: `g^m = B / prod(d_i)`, then a small-range
/// discrete-log lookup. A miss means an invalid partial slipped through and
/// is an integrity failure, not a crypto one.
pub fn recover_count<'a>(
    aggregate: &BallotCipher,
    partials: impl IntoIterator<Item = &'a PartialDecryption>,
    table: &PowerTable,
) -> Result<u64, Error> {
    let grp = group();
    let combined_d = partials
        .into_iter()
        .fold(BigUint::one(), |acc, p| grp.mul(&acc, &p.d));
    let g_m = grp.div(&aggregate.b, &combined_d)?;
    table.lookup(&g_m).ok_or(Error::TallyUndecodable)
}
