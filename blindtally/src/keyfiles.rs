use crate::{election_key, BallotCipher, BallotProof, Error};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use num_bigint_dig::BigUint;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::path::Path;

fn keyfile_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::KeyFile(path.display().to_string(), err.to_string())
}

/// Write an RSA private key as PKCS#8 PEM.
pub fn save_rsa_private_key(path: &Path, key: &RsaPrivateKey) -> Result<(), Error> {
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| keyfile_error(path, e))?;
    std::fs::write(path, pem.as_bytes())?;
    Ok(())
}

pub fn load_rsa_private_key(path: &Path) -> Result<RsaPrivateKey, Error> {
    let pem = std::fs::read_to_string(path)?;
    RsaPrivateKey::from_pkcs8_pem(&pem).map_err(|e| keyfile_error(path, e))
}

/// Write an RSA public key as SPKI PEM.
pub fn save_rsa_public_key(path: &Path, key: &RsaPublicKey) -> Result<(), Error> {
    let pem = key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| keyfile_error(path, e))?;
    std::fs::write(path, pem)?;
    Ok(())
}

pub fn load_rsa_public_key(path: &Path) -> Result<RsaPublicKey, Error> {
    let pem = std::fs::read_to_string(path)?;
    RsaPublicKey::from_public_key_pem(&pem).map_err(|e| keyfile_error(path, e))
}

/// Write a group element or scalar as one Base64 line.
pub fn save_integer(path: &Path, value: &BigUint) -> Result<(), Error> {
    let encoded = BASE64.encode(value.to_bytes_be());
    std::fs::write(path, format!("{}\n", encoded))?;
    Ok(())
}

pub fn load_integer(path: &Path) -> Result<BigUint, Error> {
    let text = std::fs::read_to_string(path)?;
    let bytes = BASE64
        .decode(text.trim())
        .map_err(|e| keyfile_error(path, e))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

/// Assemble the election public key from every arbiter's published key
/// file. Arbiters re-run this before adjudicating so late-generated keys
/// are picked up.
pub fn load_election_key<P: AsRef<Path>>(paths: &[P]) -> Result<BigUint, Error> {
    let mut keys = Vec::with_capacity(paths.len());
    for path in paths {
        keys.push(load_integer(path.as_ref())?);
    }
    Ok(election_key(keys.iter()))
}

/// Everything a voter must retain between `register` and `vote`: the
/// ciphertext, its proof, the blinding factor, and the registrar's blind
/// signature, one entry per candidate.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisteredBallot {
    pub cipher: BallotCipher,
    pub proof: BallotProof,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub blind_factor: BigUint,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub blind_signature: BigUint,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct VoterState {
    pub entries: Vec<RegisteredBallot>,
}

pub fn save_voter_state(path: &Path, state: &VoterState) -> Result<(), Error> {
    let bytes = serde_cbor::to_vec(state)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

pub fn load_voter_state(path: &Path) -> Result<VoterState, Error> {
    let bytes = std::fs::read(path)?;
    Ok(serde_cbor::from_slice(&bytes)?)
}
