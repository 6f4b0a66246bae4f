use crate::Error;
use lazy_static::lazy_static;
use num_bigint_dig::{BigUint, ModInverse, RandBigInt};
use num_traits::One;
use rand::{CryptoRng, Rng};

/// The 2048-bit MODP safe prime (RFC 3526 group 14).
const MODP_2048_PRIME_HEX: &[u8] =
    b"ffffffffffffffffc90fdaa22168c234c4c6628b80dc1cd129024e088a67cc74\
      020bbea63b139b22514a08798e3404ddef9519b3cd3a431b302b0a6df25f1437\
      4fe1356d6d51c245e485b576625e7ec6f44c42e9a637ed6b0bff5cb6f406b7ed\
      ee386bfb5a899fa5ae9f24117c4b1fe649286651ece45b3dc2007cb8a163bf05\
      98da48361c55d39a69163fa8fd24cf5f83655d23dca3ad961c62f356208552bb\
      9ed529077096966d670c354e4abc9804f1746c08ca18217c32905e462e36ce3b\
      e39e772c180e86039b2783a2ec07a28fb5c55df06f4c52c9de2bcbf695581718\
      3995497cea956ae515d2261898fa051015728e5a8aacaa68ffffffffffffffff";

lazy_static! {
    static ref GROUP: Group = Group::modp_2048();
}

/// The fixed election group: a safe prime `p`, the prime order `q = (p-1)/2`
/// of the quadratic-residue subgroup, and a generator `g` of that subgroup.
///
/// Every ElGamal value, Diffie-Hellman value, and proof transcript lives in
/// this subgroup; scalars are canonical representatives in `[0, q)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub prime: BigUint,
    pub order: BigUint,
    pub generator: BigUint,
}

/// The process-wide group parameters.
pub fn group() -> &'static Group {
    &GROUP
}

impl Group {
    fn modp_2048() -> Group {
        let hex: Vec<u8> = MODP_2048_PRIME_HEX
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        let prime = BigUint::parse_bytes(&hex, 16).expect("bad group constant");
        let order = (&prime - BigUint::one()) >> 1usize;
        // 4 = 2^2 is a quadratic residue and so generates the order-q subgroup.
        let generator = BigUint::from(4u32);
        Group {
            prime,
            order,
            generator,
        }
    }

    /// `base^exp mod p`.
    pub fn pow(&self, base: &BigUint, exp: &BigUint) -> BigUint {
        base.modpow(exp, &self.prime)
    }

    /// `g^exp mod p`.
    pub fn pow_g(&self, exp: &BigUint) -> BigUint {
        self.generator.modpow(exp, &self.prime)
    }

    /// `a * b mod p`.
    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.prime
    }

    /// `a * b^-1 mod p`.
    pub fn div(&self, a: &BigUint, b: &BigUint) -> Result<BigUint, Error> {
        let inv = mod_inv(b, &self.prime).ok_or(Error::NonInvertible)?;
        Ok(self.mul(a, &inv))
    }

    /// `a^-1 mod p`.
    pub fn inv(&self, a: &BigUint) -> Result<BigUint, Error> {
        mod_inv(a, &self.prime).ok_or(Error::NonInvertible)
    }

    /// Uniform scalar in `[1, q)`.
    pub fn rand_scalar<R: Rng + CryptoRng>(&self, rng: &mut R) -> BigUint {
        rng.gen_biguint_range(&BigUint::one(), &self.order)
    }

    /// `(a + b) mod q`.
    pub fn add_scalar(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + b) % &self.order
    }

    /// `(a - b) mod q`, canonical non-negative representative.
    pub fn sub_scalar(&self, a: &BigUint, b: &BigUint) -> BigUint {
        let a = a % &self.order;
        let b = b % &self.order;
        ((a + &self.order) - b) % &self.order
    }

    /// `(a * b) mod q`.
    pub fn mul_scalar(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.order
    }

    /// A group element must be in `[1, p)`; zero has no inverse and leaks
    /// nothing useful, so it is rejected up front.
    pub fn contains(&self, x: &BigUint) -> bool {
        *x > BigUint::from(0u32) && *x < self.prime
    }
}

/// `a^-1 mod m`, if it exists.
pub fn mod_inv(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    a.mod_inverse(m).and_then(|i| i.to_biguint())
}
