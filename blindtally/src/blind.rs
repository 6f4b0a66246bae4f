use crate::{mod_inv, BallotCipher, Error};
use num_bigint_dig::{BigUint, RandBigInt};
use rand::{CryptoRng, Rng};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::Pkcs1v15Sign;
use sha2::{Digest, Sha256};

pub use rsa::{RsaPrivateKey, RsaPublicKey};

/// Generate an RSA keypair for a registrar or tallyer identity.
pub fn generate_rsa_keypair<R: Rng + CryptoRng>(
    rng: &mut R,
    bits: usize,
) -> Result<(RsaPrivateKey, RsaPublicKey), Error> {
    let private = RsaPrivateKey::new(rng, bits)?;
    let public = RsaPublicKey::from(&private);
    Ok((private, public))
}

/// PKCS#1 v1.5 signature over the SHA-256 digest of `message`. Used for DH
/// transcripts and bulletin-board records.
pub fn sign_message(key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>, Error> {
    let digest = Sha256::digest(message);
    Ok(key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)?)
}

/// Verify a PKCS#1 v1.5 signature over `message`.
pub fn verify_message(key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> bool {
    let digest = Sha256::digest(message);
    key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        .is_ok()
}

/// Hash a ballot cipher into Z*_N: the SHA-256 digest of its canonical
/// serialization, read as a big-endian integer. The digest is 256 bits and
/// every supported modulus is at least 1024, so no reduction is needed.
pub fn message_representative(cipher: &BallotCipher) -> Result<BigUint, Error> {
    let bytes = serde_cbor::to_vec(cipher)?;
    Ok(BigUint::from_bytes_be(&Sha256::digest(&bytes)))
}

/// A blinded ballot digest together with the factor needed to unblind the
/// registrar's signature. The factor never leaves the voter.
#[derive(Debug, Clone)]
pub struct BlindedMessage {
    pub blinded: BigUint,
    pub factor: BigUint,
}

/// Blind a ballot cipher for signing: `m * r^e mod N` with `r` invertible
/// mod N.
pub fn blind<R: Rng + CryptoRng>(
    key: &RsaPublicKey,
    cipher: &BallotCipher,
    rng: &mut R,
) -> Result<BlindedMessage, Error> {
    let n = key.n();
    let m = message_representative(cipher)?;

    let factor = loop {
        let candidate = rng.gen_biguint_range(&BigUint::from(2u32), n);
        if mod_inv(&candidate, n).is_some() {
            break candidate;
        }
    };

    let blinded = (&m * factor.modpow(key.e(), n)) % n;
    Ok(BlindedMessage { blinded, factor })
}

/// Sign a blinded message without seeing the underlying ballot:
/// `(m * r^e)^d = m^d * r mod N`.
pub fn blind_sign(key: &RsaPrivateKey, blinded: &BigUint) -> Result<BigUint, Error> {
    if blinded >= key.n() {
        return Err(Error::BlindedOutOfRange);
    }
    Ok(blinded.modpow(key.d(), key.n()))
}

/// Strip the blinding factor to recover `m^d mod N`.
pub fn unblind(
    key: &RsaPublicKey,
    blind_signature: &BigUint,
    factor: &BigUint,
) -> Result<BigUint, Error> {
    let inv = mod_inv(factor, key.n()).ok_or(Error::NonInvertible)?;
    Ok((blind_signature * inv) % key.n())
}

/// Check an unblinded registrar signature against the ballot it authorizes:
/// `sig^e == H(cipher) mod N`.
pub fn blind_verify(key: &RsaPublicKey, cipher: &BallotCipher, signature: &BigUint) -> bool {
    let m = match message_representative(cipher) {
        Ok(m) => m,
        Err(_) => return false,
    };
    signature.modpow(key.e(), key.n()) == m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group;
    use num_bigint_dig::BigUint;

    fn test_cipher(seed: u32) -> BallotCipher {
        let grp = group();
        BallotCipher {
            a: grp.pow_g(&BigUint::from(seed)),
            b: grp.pow_g(&BigUint::from(seed + 1)),
        }
    }

    #[test]
    fn plain_signature_round_trip() {
        let mut rng = rand::rngs::OsRng;
        let (private, public) = generate_rsa_keypair(&mut rng, 1024).unwrap();
        let sig = sign_message(&private, b"transcript").unwrap();
        assert!(verify_message(&public, b"transcript", &sig));
        assert!(!verify_message(&public, b"transcripT", &sig));

        let mut tampered = sig.clone();
        tampered[0] ^= 0x01;
        assert!(!verify_message(&public, b"transcript", &tampered));
    }

    #[test]
    fn blind_round_trip_matches_raw_signature() {
        let mut rng = rand::rngs::OsRng;
        let (private, public) = generate_rsa_keypair(&mut rng, 1024).unwrap();
        let cipher = test_cipher(42);

        let blinded = blind(&public, &cipher, &mut rng).unwrap();
        let blind_sig = blind_sign(&private, &blinded.blinded).unwrap();
        let sig = unblind(&public, &blind_sig, &blinded.factor).unwrap();

        // unblind(sign(blind(m, r))) == m^d mod N
        let m = message_representative(&cipher).unwrap();
        let raw = m.modpow(private.d(), private.n());
        assert_eq!(sig, raw);
        assert!(blind_verify(&public, &cipher, &sig));
    }

    #[test]
    fn signature_does_not_verify_for_other_ballot() {
        let mut rng = rand::rngs::OsRng;
        let (private, public) = generate_rsa_keypair(&mut rng, 1024).unwrap();
        let cipher = test_cipher(7);
        let other = test_cipher(8);

        let blinded = blind(&public, &cipher, &mut rng).unwrap();
        let blind_sig = blind_sign(&private, &blinded.blinded).unwrap();
        let sig = unblind(&public, &blind_sig, &blinded.factor).unwrap();

        assert!(!blind_verify(&public, &other, &sig));
    }

    #[test]
    fn oversized_blinded_message_is_rejected() {
        let mut rng = rand::rngs::OsRng;
        let (private, _) = generate_rsa_keypair(&mut rng, 1024).unwrap();
        let too_big = private.n().clone();
        assert!(matches!(
            blind_sign(&private, &too_big),
            Err(Error::BlindedOutOfRange)
        ));
    }

    #[test]
    fn blinded_message_hides_the_digest() {
        let mut rng = rand::rngs::OsRng;
        let (_, public) = generate_rsa_keypair(&mut rng, 1024).unwrap();
        let cipher = test_cipher(3);
        let m = message_representative(&cipher).unwrap();
        let blinded = blind(&public, &cipher, &mut rng).unwrap();
        assert_ne!(blinded.blinded, m);
    }
}
