use crate::{
    group, read_frame, sign_message, verify_message, write_frame, ClientHello, Error, Payload,
    SealedRecord, ServerHello, WireMessage,
};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use num_bigint_dig::BigUint;
use num_traits::One;
use rand::{CryptoRng, Rng};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::io::{Read, Write};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

const AES_IV_LENGTH: usize = 16;

/// Independent keys for the two halves of encrypt-then-MAC, both derived
/// from the DH shared secret.
pub struct SessionKeys {
    aes_key: [u8; 32],
    mac_key: [u8; 32],
}

fn derive_session_keys(shared: &BigUint) -> SessionKeys {
    let hkdf = Hkdf::<Sha256>::new(None, &shared.to_bytes_be());
    let mut aes_key = [0u8; 32];
    let mut mac_key = [0u8; 32];
    hkdf.expand(b"blindtally-record-encrypt", &mut aes_key)
        .expect("hkdf expand");
    hkdf.expand(b"blindtally-record-mac", &mut mac_key)
        .expect("hkdf expand");
    SessionKeys { aes_key, mac_key }
}

/// Signature preimage binding the server's value to the echoed client value.
fn transcript_bytes(server_value: &BigUint, client_value: &BigUint) -> Vec<u8> {
    let mut out = Vec::new();
    for value in [server_value, client_value] {
        let bytes = value.to_bytes_be();
        out.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
        out.extend_from_slice(&bytes);
    }
    out
}

fn check_dh_public(value: &BigUint) -> Result<(), Error> {
    // 1 and 0 collapse the shared secret; anything >= p is malformed.
    if !group().contains(value) || value.is_one() {
        return Err(Error::UnexpectedMessage);
    }
    Ok(())
}

/// Encrypt-then-MAC a plaintext under fresh randomness.
pub fn seal<R: Rng + CryptoRng>(
    keys: &SessionKeys,
    plaintext: &[u8],
    rng: &mut R,
) -> SealedRecord {
    let mut iv = [0u8; AES_IV_LENGTH];
    rng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(&keys.aes_key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut mac = HmacSha256::new_from_slice(&keys.mac_key).expect("hmac key");
    mac.update(&iv);
    mac.update(&ciphertext);

    SealedRecord {
        iv: iv.to_vec(),
        ciphertext,
        mac: mac.finalize().into_bytes().to_vec(),
    }
}

/// Verify the tag in constant time, then decrypt. Every rejection is the
/// same `RecordAuth` error so a peer cannot tell which check failed.
pub fn open(keys: &SessionKeys, record: &SealedRecord) -> Result<Vec<u8>, Error> {
    if record.iv.len() != AES_IV_LENGTH {
        return Err(Error::RecordAuth);
    }

    let mut mac = HmacSha256::new_from_slice(&keys.mac_key).expect("hmac key");
    mac.update(&record.iv);
    mac.update(&record.ciphertext);
    if mac.verify_slice(&record.mac).is_err() {
        return Err(Error::RecordAuth);
    }

    let mut iv = [0u8; AES_IV_LENGTH];
    iv.copy_from_slice(&record.iv);
    Aes256CbcDec::new(&keys.aes_key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&record.ciphertext)
        .map_err(|_| Error::RecordAuth)
}

/// An established authenticated session. Both sides hold the same derived
/// keys; records are sealed per message with a fresh IV.
pub struct Session<S> {
    stream: S,
    keys: SessionKeys,
}

impl<S: Read + Write> Session<S> {
    /// Client side: send `g^a`, receive the signed `(g^b, g^a)` response,
    /// and abort before deriving any key if the echo or the signature is
    /// wrong.
    pub fn connect<R: Rng + CryptoRng>(
        mut stream: S,
        server_key: &RsaPublicKey,
        rng: &mut R,
    ) -> Result<Session<S>, Error> {
        let grp = group();
        let secret = grp.rand_scalar(rng);
        let public_value = grp.pow_g(&secret);

        write_frame(
            &mut stream,
            &WireMessage::ClientHello(ClientHello {
                public_value: public_value.clone(),
            }),
        )?;

        let hello = match read_frame(&mut stream)? {
            WireMessage::ServerHello(hello) => hello,
            _ => return Err(Error::UnexpectedMessage),
        };

        if hello.client_public_value != public_value {
            return Err(Error::SessionEcho);
        }
        check_dh_public(&hello.server_public_value)?;

        let transcript = transcript_bytes(&hello.server_public_value, &hello.client_public_value);
        if !verify_message(server_key, &transcript, &hello.signature) {
            return Err(Error::ServerAuth);
        }

        let shared = grp.pow(&hello.server_public_value, &secret);
        Ok(Session {
            stream,
            keys: derive_session_keys(&shared),
        })
    }

    /// Server side: receive `g^a`, respond with `(g^b, g^a)` signed by our
    /// long-term key, and derive the record keys.
    pub fn accept<R: Rng + CryptoRng>(
        mut stream: S,
        signing_key: &RsaPrivateKey,
        rng: &mut R,
    ) -> Result<Session<S>, Error> {
        let grp = group();

        let hello = match read_frame(&mut stream)? {
            WireMessage::ClientHello(hello) => hello,
            _ => return Err(Error::UnexpectedMessage),
        };
        check_dh_public(&hello.public_value)?;

        let secret = grp.rand_scalar(rng);
        let server_public_value = grp.pow_g(&secret);
        let transcript = transcript_bytes(&server_public_value, &hello.public_value);
        let signature = sign_message(signing_key, &transcript)?;

        write_frame(
            &mut stream,
            &WireMessage::ServerHello(ServerHello {
                server_public_value,
                client_public_value: hello.public_value.clone(),
                signature,
            }),
        )?;

        let shared = grp.pow(&hello.public_value, &secret);
        Ok(Session {
            stream,
            keys: derive_session_keys(&shared),
        })
    }

    pub fn send(&mut self, payload: &Payload) -> Result<(), Error> {
        let plaintext = serde_cbor::to_vec(payload)?;
        let record = seal(&self.keys, &plaintext, &mut rand::rngs::OsRng);
        write_frame(&mut self.stream, &WireMessage::Sealed(record))
    }

    pub fn recv(&mut self) -> Result<Payload, Error> {
        let record = match read_frame(&mut self.stream)? {
            WireMessage::Sealed(record) => record,
            _ => return Err(Error::UnexpectedMessage),
        };
        let plaintext = open(&self.keys, &record)?;
        Ok(serde_cbor::from_slice(&plaintext)?)
    }
}
