use crate::{
    ballots_digest, blind_verify, canonical_bytes, verify_ballot, verify_message, BallotCipher,
    DecryptionProof, Error, PartialDecryption, SignedBallot,
};
use num_bigint_dig::BigUint;
use rsa::RsaPublicKey;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// One voter's registrar authorization: the blind signatures issued for the
/// voter's blinded ballot digests. Unique per voter id.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthorizationRow {
    pub voter_id: String,
    #[serde(with = "crate::serde_hex::biguint_hex_vec")]
    pub signatures: Vec<BigUint>,
}

/// A tallyer-accepted submission: the per-candidate ballot sequence and the
/// tallyer's RSA signature over its canonical serialization.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BallotRecord {
    pub ballots: Vec<SignedBallot>,
    pub tallyer_signature: Vec<u8>,
}

impl BallotRecord {
    /// The store key for this record.
    pub fn digest(&self) -> Result<String, Error> {
        ballots_digest(&self.ballots)
    }

    /// Re-run every check the tallyer ran before accepting: the tallyer
    /// signature over the sequence, and each slot's blind signature and
    /// 0-or-1 proof.
    pub fn verify(
        &self,
        registrar_key: &RsaPublicKey,
        tallyer_key: &RsaPublicKey,
        election_key: &BigUint,
    ) -> Result<(), Error> {
        if self.ballots.is_empty() {
            return Err(Error::LengthMismatch);
        }
        let preimage = canonical_bytes(&self.ballots)?;
        if !verify_message(tallyer_key, &preimage, &self.tallyer_signature) {
            return Err(Error::RecordSignatureInvalid);
        }
        for ballot in &self.ballots {
            if !blind_verify(registrar_key, &ballot.cipher, &ballot.signature) {
                return Err(Error::BlindSignatureInvalid);
            }
            if !verify_ballot(&ballot.cipher, &ballot.proof, election_key) {
                return Err(Error::BallotProofInvalid);
            }
        }
        Ok(())
    }

    /// Ciphertext for candidate slot `j`.
    pub fn cipher(&self, slot: usize) -> Option<&BallotCipher> {
        self.ballots.get(slot).map(|b| &b.cipher)
    }
}

/// One arbiter's published partial decryption for one candidate slot,
/// carrying the arbiter's own public key so any verifier can check the
/// proof.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PartialRow {
    pub arbiter_id: String,
    #[serde(with = "crate::serde_hex::biguint_hex")]
    pub arbiter_key: BigUint,
    pub slot: u32,
    pub decryption: PartialDecryption,
    pub proof: DecryptionProof,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct BoardInner {
    authorizations: BTreeMap<String, AuthorizationRow>,
    ballots: BTreeMap<String, BallotRecord>,
    partials: BTreeMap<String, PartialRow>,
}

/// The public bulletin board: three append-style relations behind one
/// mutex. All principals in a deployment share one board file; writes
/// rewrite the file while the lock is held.
pub struct BulletinBoard {
    path: Option<PathBuf>,
    inner: Mutex<BoardInner>,
}

fn partial_key(arbiter_id: &str, slot: u32) -> String {
    format!("{}/{}", arbiter_id, slot)
}

impl BulletinBoard {
    /// A board with no backing file; used by tests and single-process runs.
    pub fn in_memory() -> BulletinBoard {
        BulletinBoard {
            path: None,
            inner: Mutex::new(BoardInner::default()),
        }
    }

    /// Open (or create) a file-backed board.
    pub fn open(path: impl Into<PathBuf>) -> Result<BulletinBoard, Error> {
        let path = path.into();
        let inner = if path.exists() {
            let bytes = std::fs::read(&path)?;
            serde_cbor::from_slice(&bytes)?
        } else {
            BoardInner::default()
        };
        Ok(BulletinBoard {
            path: Some(path),
            inner: Mutex::new(inner),
        })
    }

    fn persist(&self, inner: &BoardInner) -> Result<(), Error> {
        if let Some(path) = &self.path {
            let bytes = serde_cbor::to_vec(inner)?;
            std::fs::write(path, bytes)?;
        }
        Ok(())
    }

    pub fn find_authorization(&self, voter_id: &str) -> Option<AuthorizationRow> {
        let inner = self.inner.lock().unwrap();
        inner.authorizations.get(voter_id).cloned()
    }

    /// Insert a voter authorization; a second insert for the same voter id
    /// is a policy violation, never an overwrite.
    pub fn insert_authorization(&self, row: AuthorizationRow) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        if inner.authorizations.contains_key(&row.voter_id) {
            return Err(Error::DuplicateVoter(row.voter_id));
        }
        inner.authorizations.insert(row.voter_id.clone(), row);
        self.persist(&inner)
    }

    pub fn ballot_exists(&self, digest: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.ballots.contains_key(digest)
    }

    /// Append a tallyer record; resubmitting the same ballot sequence is a
    /// policy violation.
    pub fn insert_ballot(&self, record: BallotRecord) -> Result<(), Error> {
        let digest = record.digest()?;
        let mut inner = self.inner.lock().unwrap();
        if inner.ballots.contains_key(&digest) {
            return Err(Error::DuplicateBallot);
        }
        inner.ballots.insert(digest, record);
        self.persist(&inner)
    }

    pub fn all_ballots(&self) -> Vec<BallotRecord> {
        let inner = self.inner.lock().unwrap();
        inner.ballots.values().cloned().collect()
    }

    /// Publish a partial decryption, keyed (arbiter id, slot). The same
    /// arbiter may reissue; the row is overwritten in place.
    pub fn publish_partial(&self, row: PartialRow) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .partials
            .insert(partial_key(&row.arbiter_id, row.slot), row);
        self.persist(&inner)
    }

    pub fn all_partials(&self) -> Vec<PartialRow> {
        let inner = self.inner.lock().unwrap();
        inner.partials.values().cloned().collect()
    }

    pub fn partials_for_slot(&self, slot: u32) -> Vec<PartialRow> {
        let inner = self.inner.lock().unwrap();
        inner
            .partials
            .values()
            .filter(|row| row.slot == slot)
            .cloned()
            .collect()
    }

    /// Drop every relation; used between test elections.
    pub fn reset(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        *inner = BoardInner::default();
        self.persist(&inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{generate_keypair, partial_decrypt, BallotCipher, ErrorKind};
    use num_traits::One;

    fn authorization(id: &str) -> AuthorizationRow {
        AuthorizationRow {
            voter_id: id.into(),
            signatures: vec![BigUint::from(5u32)],
        }
    }

    #[test]
    fn duplicate_voter_is_policy_error() {
        let board = BulletinBoard::in_memory();
        board.insert_authorization(authorization("alice")).unwrap();
        let err = board
            .insert_authorization(authorization("alice"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Policy);
        // The original row survives.
        assert_eq!(
            board.find_authorization("alice").unwrap().signatures,
            vec![BigUint::from(5u32)]
        );
    }

    #[test]
    fn partial_rows_overwrite_per_arbiter_and_slot() {
        let mut rng = rand::rngs::OsRng;
        let board = BulletinBoard::in_memory();
        let keypair = generate_keypair(&mut rng);
        let aggregate = BallotCipher {
            a: BigUint::one(),
            b: BigUint::one(),
        };
        let (dec, proof) = partial_decrypt(&aggregate, &keypair, &mut rng);

        for slot in [0u32, 1] {
            board
                .publish_partial(PartialRow {
                    arbiter_id: "arb-1".into(),
                    arbiter_key: keypair.public.clone(),
                    slot,
                    decryption: dec.clone(),
                    proof: proof.clone(),
                })
                .unwrap();
        }
        assert_eq!(board.all_partials().len(), 2);

        // Reissue by the same arbiter replaces, never duplicates.
        board
            .publish_partial(PartialRow {
                arbiter_id: "arb-1".into(),
                arbiter_key: keypair.public.clone(),
                slot: 0,
                decryption: dec,
                proof,
            })
            .unwrap();
        assert_eq!(board.all_partials().len(), 2);
        assert_eq!(board.partials_for_slot(0).len(), 1);
    }

    #[test]
    fn record_verification_detects_any_field_tamper() {
        let mut rng = rand::rngs::OsRng;
        let (registrar_private, registrar_public) =
            crate::generate_rsa_keypair(&mut rng, 1024).unwrap();
        let (tallyer_private, tallyer_public) = crate::generate_rsa_keypair(&mut rng, 1024).unwrap();
        let election_key = generate_keypair(&mut rng).public;

        let (cipher, proof) = crate::generate_ballot(1, &election_key, &mut rng).unwrap();
        let blinding = crate::blind(&registrar_public, &cipher, &mut rng).unwrap();
        let blind_sig = crate::blind_sign(&registrar_private, &blinding.blinded).unwrap();
        let signature = crate::unblind(&registrar_public, &blind_sig, &blinding.factor).unwrap();

        let ballots = vec![crate::SignedBallot {
            cipher,
            proof,
            signature,
        }];
        let tallyer_signature =
            crate::sign_message(&tallyer_private, &canonical_bytes(&ballots).unwrap()).unwrap();
        let record = BallotRecord {
            ballots,
            tallyer_signature,
        };

        record
            .verify(&registrar_public, &tallyer_public, &election_key)
            .unwrap();

        let mut tampered = record.clone();
        tampered.tallyer_signature[3] ^= 0x20;
        assert!(matches!(
            tampered.verify(&registrar_public, &tallyer_public, &election_key),
            Err(Error::RecordSignatureInvalid)
        ));

        let mut tampered = record.clone();
        tampered.ballots[0].cipher.a ^= BigUint::from(1u32);
        assert!(matches!(
            tampered.verify(&registrar_public, &tallyer_public, &election_key),
            Err(Error::RecordSignatureInvalid)
        ));

        let mut tampered = record;
        tampered.ballots[0].signature ^= BigUint::from(1u32);
        assert!(matches!(
            tampered.verify(&registrar_public, &tallyer_public, &election_key),
            Err(Error::RecordSignatureInvalid)
        ));
    }

    #[test]
    fn board_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.cbor");

        {
            let board = BulletinBoard::open(&path).unwrap();
            board.insert_authorization(authorization("bob")).unwrap();
        }
        let reopened = BulletinBoard::open(&path).unwrap();
        assert!(reopened.find_authorization("bob").is_some());

        reopened.reset().unwrap();
        let reopened = BulletinBoard::open(&path).unwrap();
        assert!(reopened.find_authorization("bob").is_none());
    }
}
