use crate::{BallotCipher, BallotProof, Error};
use num_bigint_dig::BigUint;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

/// Hard cap on a single frame; anything larger is a malformed peer.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Everything that crosses a socket. The enum variant is the wire type tag;
/// after session establishment only `Sealed` records are exchanged.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum WireMessage {
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    Sealed(SealedRecord),
}

/// Client's ephemeral DH public value `g^a`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClientHello {
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub public_value: BigUint,
}

/// Server's ephemeral DH public value, the echoed client value, and the
/// server's RSA signature over both (in that order).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerHello {
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub server_public_value: BigUint,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub client_public_value: BigUint,
    pub signature: Vec<u8>,
}

/// Encrypt-then-MAC record: HMAC-SHA256 over `iv || ciphertext`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SealedRecord {
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub mac: Vec<u8>,
}

/// Plaintext payloads carried inside sealed records.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum Payload {
    Register(RegisterRequest),
    RegisterReply(RegisterReply),
    Cast(CastRequest),
}

/// Voter -> registrar: one blinded ballot digest per candidate.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub voter_id: String,
    #[serde(with = "crate::serde_hex::biguint_hex_vec")]
    pub blinded: Vec<BigUint>,
}

/// Registrar -> voter: one blind signature per blinded message, in order.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterReply {
    pub voter_id: String,
    #[serde(with = "crate::serde_hex::biguint_hex_vec")]
    pub signatures: Vec<BigUint>,
}

/// One candidate slot of a submission: the ciphertext, its 0-or-1 proof,
/// and the unblinded registrar signature authorizing it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignedBallot {
    pub cipher: BallotCipher,
    pub proof: BallotProof,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub signature: BigUint,
}

/// Voter -> tallyer: the full per-candidate sequence.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CastRequest {
    pub ballots: Vec<SignedBallot>,
}

/// Canonical bytes used wherever a structure is signed or hashed.
pub fn canonical_bytes<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    Ok(serde_cbor::to_vec(value)?)
}

/// The tallied-ballots store key: digest of the canonical ballot sequence.
pub fn ballots_digest(ballots: &[SignedBallot]) -> Result<String, Error> {
    let bytes = canonical_bytes(&ballots)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Write one length-prefixed frame.
pub fn write_frame<W: Write>(writer: &mut W, message: &WireMessage) -> Result<(), Error> {
    let payload = serde_cbor::to_vec(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(Error::OversizedFrame);
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one length-prefixed frame.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<WireMessage, Error> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::OversizedFrame);
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(serde_cbor::from_slice(&payload)?)
}
