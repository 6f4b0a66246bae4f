use crate::{
    ballots_digest, blind_verify, canonical_bytes, sign_message, verify_ballot, BallotRecord,
    BulletinBoard, CastRequest, Error, Payload, Session,
};
use log::{info, warn};
use num_bigint_dig::BigUint;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

/// The ingestion gateway. Verifies submissions end-to-end, signs accepted
/// ones with its own RSA key, and appends them to the bulletin board.
pub struct TallyerService {
    signing_key: RsaPrivateKey,
    registrar_key: RsaPublicKey,
    election_key: BigUint,
    board: Arc<BulletinBoard>,
}

impl TallyerService {
    pub fn new(
        signing_key: RsaPrivateKey,
        registrar_key: RsaPublicKey,
        election_key: BigUint,
        board: Arc<BulletinBoard>,
    ) -> TallyerService {
        TallyerService {
            signing_key,
            registrar_key,
            election_key,
            board,
        }
    }

    pub fn serve(self: Arc<Self>, listener: TcpListener) {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let service = Arc::clone(&self);
                    std::thread::spawn(move || {
                        if let Err(err) = service.handle_connection(stream) {
                            warn!("tallyer: dropping connection: {} ({:?})", err, err.kind());
                        }
                    });
                }
                Err(err) => warn!("tallyer: accept failed: {}", err),
            }
        }
    }

    /// One voting session: key exchange, decrypt, verify, record. The voter
    /// does not get a reply; the record on the board is the receipt.
    pub fn handle_connection(&self, stream: TcpStream) -> Result<(), Error> {
        let mut session = Session::accept(stream, &self.signing_key, &mut rand::rngs::OsRng)?;
        let request = match session.recv()? {
            Payload::Cast(request) => request,
            _ => return Err(Error::UnexpectedMessage),
        };
        self.record_submission(request)
    }

    /// Validate and append one submission. Any single slot failing its
    /// blind-signature or proof check aborts the whole submission and
    /// nothing reaches the board.
    pub fn record_submission(&self, request: CastRequest) -> Result<(), Error> {
        if request.ballots.is_empty() {
            return Err(Error::LengthMismatch);
        }

        let digest = ballots_digest(&request.ballots)?;
        if self.board.ballot_exists(&digest) {
            return Err(Error::DuplicateBallot);
        }

        for ballot in &request.ballots {
            if !blind_verify(&self.registrar_key, &ballot.cipher, &ballot.signature) {
                return Err(Error::BlindSignatureInvalid);
            }
            if !verify_ballot(&ballot.cipher, &ballot.proof, &self.election_key) {
                return Err(Error::BallotProofInvalid);
            }
        }

        let preimage = canonical_bytes(&request.ballots)?;
        let tallyer_signature = sign_message(&self.signing_key, &preimage)?;

        self.board.insert_ballot(BallotRecord {
            ballots: request.ballots,
            tallyer_signature,
        })?;
        info!("tallyer: recorded ballot {}", digest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        blind, blind_sign, generate_ballot, generate_keypair, generate_rsa_keypair, unblind,
        ErrorKind, SignedBallot,
    };

    struct Fixture {
        tallyer: TallyerService,
        registrar_private: RsaPrivateKey,
        registrar_public: RsaPublicKey,
        election_key: BigUint,
    }

    fn fixture() -> Fixture {
        let mut rng = rand::rngs::OsRng;
        let (registrar_private, registrar_public) = generate_rsa_keypair(&mut rng, 1024).unwrap();
        let (tallyer_private, _) = generate_rsa_keypair(&mut rng, 1024).unwrap();
        let election_key = generate_keypair(&mut rng).public;
        let tallyer = TallyerService::new(
            tallyer_private,
            registrar_public.clone(),
            election_key.clone(),
            Arc::new(BulletinBoard::in_memory()),
        );
        Fixture {
            tallyer,
            registrar_private,
            registrar_public,
            election_key,
        }
    }

    fn signed_ballot(fixture: &Fixture, vote: u8) -> SignedBallot {
        let mut rng = rand::rngs::OsRng;
        let (cipher, proof) = generate_ballot(vote, &fixture.election_key, &mut rng).unwrap();
        let blinded = blind(&fixture.registrar_public, &cipher, &mut rng).unwrap();
        let blind_sig = blind_sign(&fixture.registrar_private, &blinded.blinded).unwrap();
        let signature = unblind(&fixture.registrar_public, &blind_sig, &blinded.factor).unwrap();
        SignedBallot {
            cipher,
            proof,
            signature,
        }
    }

    #[test]
    fn valid_submission_is_recorded() {
        let fixture = fixture();
        let ballots = vec![signed_ballot(&fixture, 1), signed_ballot(&fixture, 0)];
        fixture
            .tallyer
            .record_submission(CastRequest { ballots })
            .unwrap();
        assert_eq!(fixture.tallyer.board.all_ballots().len(), 1);
    }

    #[test]
    fn replayed_submission_is_policy_error() {
        let fixture = fixture();
        let ballots = vec![signed_ballot(&fixture, 1)];
        fixture
            .tallyer
            .record_submission(CastRequest {
                ballots: ballots.clone(),
            })
            .unwrap();
        let err = fixture
            .tallyer
            .record_submission(CastRequest { ballots })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Policy);
        assert_eq!(fixture.tallyer.board.all_ballots().len(), 1);
    }

    #[test]
    fn unauthorized_ballot_is_crypto_error() {
        let fixture = fixture();
        let mut ballot = signed_ballot(&fixture, 1);
        ballot.signature += 1u32;
        let err = fixture
            .tallyer
            .record_submission(CastRequest {
                ballots: vec![ballot],
            })
            .unwrap_err();
        assert!(matches!(err, Error::BlindSignatureInvalid));
        assert!(fixture.tallyer.board.all_ballots().is_empty());
    }

    #[test]
    fn one_bad_slot_rejects_the_whole_submission() {
        let fixture = fixture();
        let good = signed_ballot(&fixture, 1);
        let mut bad = signed_ballot(&fixture, 0);
        bad.proof.c0 = crate::group().add_scalar(&bad.proof.c0, &BigUint::from(1u32));
        let err = fixture
            .tallyer
            .record_submission(CastRequest {
                ballots: vec![good, bad],
            })
            .unwrap_err();
        assert!(matches!(err, Error::BallotProofInvalid));
        assert!(fixture.tallyer.board.all_ballots().is_empty());
    }

    #[test]
    fn empty_submission_is_protocol_error() {
        let fixture = fixture();
        let err = fixture
            .tallyer
            .record_submission(CastRequest { ballots: vec![] })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
