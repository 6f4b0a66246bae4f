use crate::{group, hash_vote_zkp, Error};
use num_bigint_dig::BigUint;
use rand::{CryptoRng, Rng};

/// An ElGamal encryption `(a, b) = (g^r, pk^r * g^v)` of a 0/1 vote for one
/// candidate under the election public key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BallotCipher {
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub a: BigUint,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub b: BigUint,
}

/// Disjunctive Chaum-Pedersen proof that a `BallotCipher` encrypts 0 or 1,
/// without revealing which. The branch for the actual vote is proved
/// honestly; the other branch is simulated with a pre-chosen challenge, and
/// the Fiat-Shamir hash pins the sum of both challenges.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BallotProof {
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub a0: BigUint,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub a1: BigUint,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub b0: BigUint,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub b1: BigUint,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub c0: BigUint,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub c1: BigUint,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub r0: BigUint,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub r1: BigUint,
}

/// Encrypt a 0/1 vote under `pk` and prove it well-formed.
pub fn generate_ballot<R: Rng + CryptoRng>(
    vote: u8,
    pk: &BigUint,
    rng: &mut R,
) -> Result<(BallotCipher, BallotProof), Error> {
    if vote > 1 {
        return Err(Error::VoteOutOfRange);
    }
    let grp = group();

    let r = grp.rand_scalar(rng);
    let a = grp.pow_g(&r);
    let b = grp.mul(&grp.pow(pk, &r), &grp.pow_g(&BigUint::from(vote)));

    // Simulate the branch we are not on: pick its challenge and response
    // first, then solve for commitments that satisfy the verifier equations.
    let c_sim = grp.rand_scalar(rng);
    let r_sim = grp.rand_scalar(rng);

    // The verifier checks branch 0 against b and branch 1 against b/g.
    let b_over_g = grp.div(&b, &grp.generator)?;
    let sim_target = if vote == 0 { &b_over_g } else { &b };

    let a_sim = grp.div(&grp.pow_g(&r_sim), &grp.pow(&a, &c_sim))?;
    let b_sim = grp.div(&grp.pow(pk, &r_sim), &grp.pow(sim_target, &c_sim))?;

    // Honest commitment for the real branch.
    let w = grp.rand_scalar(rng);
    let a_real = grp.pow_g(&w);
    let b_real = grp.pow(pk, &w);

    let (a0, b0, a1, b1) = if vote == 0 {
        (a_real, b_real, a_sim, b_sim)
    } else {
        (a_sim, b_sim, a_real, b_real)
    };

    let c = hash_vote_zkp(pk, &a, &b, &a0, &b0, &a1, &b1);
    let c_real = grp.sub_scalar(&c, &c_sim);
    let r_real = grp.add_scalar(&w, &grp.mul_scalar(&c_real, &r));

    let (c0, r0, c1, r1) = if vote == 0 {
        (c_real, r_real, c_sim, r_sim)
    } else {
        (c_sim, r_sim, c_real, r_real)
    };

    let cipher = BallotCipher { a, b };
    let proof = BallotProof {
        a0,
        a1,
        b0,
        b1,
        c0,
        c1,
        r0,
        r1,
    };
    Ok((cipher, proof))
}

/// Check a disjunctive ballot proof. Proofs are public, so there is no
/// side-channel concern in returning early.
pub fn verify_ballot(cipher: &BallotCipher, proof: &BallotProof, pk: &BigUint) -> bool {
    let grp = group();

    for element in [
        &cipher.a, &cipher.b, &proof.a0, &proof.a1, &proof.b0, &proof.b1,
    ] {
        if !grp.contains(element) {
            return false;
        }
    }
    if proof.c0 >= grp.order || proof.c1 >= grp.order {
        return false;
    }

    // g^r0 == a0 * a^c0  and  g^r1 == a1 * a^c1
    if grp.pow_g(&proof.r0) != grp.mul(&proof.a0, &grp.pow(&cipher.a, &proof.c0)) {
        return false;
    }
    if grp.pow_g(&proof.r1) != grp.mul(&proof.a1, &grp.pow(&cipher.a, &proof.c1)) {
        return false;
    }

    // pk^r0 == b0 * b^c0
    if grp.pow(pk, &proof.r0) != grp.mul(&proof.b0, &grp.pow(&cipher.b, &proof.c0)) {
        return false;
    }

    // pk^r1 == b1 * (b/g)^c1
    let b_over_g = match grp.div(&cipher.b, &grp.generator) {
        Ok(v) => v,
        Err(_) => return false,
    };
    if grp.pow(pk, &proof.r1) != grp.mul(&proof.b1, &grp.pow(&b_over_g, &proof.c1)) {
        return false;
    }

    // c0 + c1 == H(pk, a, b, a0, b0, a1, b1) mod q
    let expected = hash_vote_zkp(pk, &cipher.a, &cipher.b, &proof.a0, &proof.b0, &proof.a1, &proof.b1);
    grp.add_scalar(&proof.c0, &proof.c1) == expected
}
