use crate::{
    blind, combine_ciphers, generate_ballot, load_election_key, load_rsa_public_key,
    load_voter_state, recover_count, save_voter_state, unblind, verify_partial, BulletinBoard,
    CastRequest, Error, Payload, PowerTable, RegisterRequest, RegisteredBallot, Session,
    SignedBallot, VoterState,
};
use log::{info, warn};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;

/// File locations and identity for one voter.
#[derive(Debug, Clone)]
pub struct VoterConfig {
    pub voter_id: String,
    pub registrar_key_path: PathBuf,
    pub tallyer_key_path: PathBuf,
    pub arbiter_key_paths: Vec<PathBuf>,
    pub state_path: PathBuf,
}

/// Per-candidate counts plus a global success flag; `ok` is false when any
/// slot failed to decode, which means an invalid partial slipped through.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ElectionOutcome {
    pub counts: Vec<u64>,
    pub ok: bool,
}

pub struct VoterClient {
    config: VoterConfig,
    board: Arc<BulletinBoard>,
}

impl VoterClient {
    pub fn new(config: VoterConfig, board: Arc<BulletinBoard>) -> VoterClient {
        VoterClient { config, board }
    }

    /// Register with the registrar: encrypt and prove each 0/1 choice,
    /// blind the ciphertext digests, obtain one blind signature per
    /// candidate, and persist everything needed to vote later.
    pub fn register(&self, addr: &str, votes: &[u8]) -> Result<(), Error> {
        let registrar_key = load_rsa_public_key(&self.config.registrar_key_path)?;
        let election_key = load_election_key(&self.config.arbiter_key_paths)?;
        let mut rng = rand::rngs::OsRng;

        let mut ciphers = Vec::with_capacity(votes.len());
        let mut blindings = Vec::with_capacity(votes.len());
        for &vote in votes {
            let (cipher, proof) = generate_ballot(vote, &election_key, &mut rng)?;
            let blinding = blind(&registrar_key, &cipher, &mut rng)?;
            ciphers.push((cipher, proof));
            blindings.push(blinding);
        }

        let stream = TcpStream::connect(addr)?;
        let mut session = Session::connect(stream, &registrar_key, &mut rng)?;
        session.send(&Payload::Register(RegisterRequest {
            voter_id: self.config.voter_id.clone(),
            blinded: blindings.iter().map(|b| b.blinded.clone()).collect(),
        }))?;

        let reply = match session.recv()? {
            Payload::RegisterReply(reply) => reply,
            _ => return Err(Error::UnexpectedMessage),
        };
        if reply.voter_id != self.config.voter_id {
            return Err(Error::UnexpectedMessage);
        }
        if reply.signatures.len() != votes.len() {
            return Err(Error::LengthMismatch);
        }

        let entries = ciphers
            .into_iter()
            .zip(blindings)
            .zip(reply.signatures)
            .map(|(((cipher, proof), blinding), blind_signature)| RegisteredBallot {
                cipher,
                proof,
                blind_factor: blinding.factor,
                blind_signature,
            })
            .collect();
        save_voter_state(&self.config.state_path, &VoterState { entries })?;
        info!(
            "voter {}: registered, state saved to {}",
            self.config.voter_id,
            self.config.state_path.display()
        );
        Ok(())
    }

    /// Submit the registered ballots to the tallyer: unblind each stored
    /// registrar signature and send the full per-candidate sequence over an
    /// authenticated session.
    pub fn cast(&self, addr: &str) -> Result<(), Error> {
        let registrar_key = load_rsa_public_key(&self.config.registrar_key_path)?;
        let tallyer_key = load_rsa_public_key(&self.config.tallyer_key_path)?;
        let state = load_voter_state(&self.config.state_path)?;
        if state.entries.is_empty() {
            return Err(Error::LengthMismatch);
        }
        let mut rng = rand::rngs::OsRng;

        let mut ballots = Vec::with_capacity(state.entries.len());
        for entry in state.entries {
            let signature = unblind(&registrar_key, &entry.blind_signature, &entry.blind_factor)?;
            ballots.push(SignedBallot {
                cipher: entry.cipher,
                proof: entry.proof,
                signature,
            });
        }

        let stream = TcpStream::connect(addr)?;
        let mut session = Session::connect(stream, &tallyer_key, &mut rng)?;
        session.send(&Payload::Cast(CastRequest { ballots }))?;
        info!("voter {}: ballot cast", self.config.voter_id);
        Ok(())
    }

    /// Independently verify the election: re-check every board record,
    /// recombine the survivors per slot, check every partial decryption
    /// under the key its row publishes, and recover each count by
    /// small-range discrete-log lookup.
    pub fn verify(&self) -> Result<ElectionOutcome, Error> {
        let registrar_key = load_rsa_public_key(&self.config.registrar_key_path)?;
        let tallyer_key = load_rsa_public_key(&self.config.tallyer_key_path)?;
        let election_key = load_election_key(&self.config.arbiter_key_paths)?;

        let mut survivors = Vec::new();
        let mut slots = None;
        for record in self.board.all_ballots() {
            if let Err(err) = record.verify(&registrar_key, &tallyer_key, &election_key) {
                warn!("verify: ignoring invalid record: {}", err);
                continue;
            }
            let t = *slots.get_or_insert(record.ballots.len());
            if record.ballots.len() != t {
                warn!(
                    "verify: ignoring record with {} slots, expected {}",
                    record.ballots.len(),
                    t
                );
                continue;
            }
            survivors.push(record);
        }
        let slots = slots.unwrap_or(0);

        let table = PowerTable::new(survivors.len() as u64);
        let mut counts = Vec::with_capacity(slots);
        let mut ok = true;
        for slot in 0..slots {
            let aggregate =
                combine_ciphers(survivors.iter().filter_map(|record| record.cipher(slot)));

            let partials: Vec<_> = self
                .board
                .partials_for_slot(slot as u32)
                .into_iter()
                .filter(|row| {
                    if row.decryption.aggregate != aggregate {
                        warn!(
                            "verify: arbiter {} decrypted a different aggregate for slot {}",
                            row.arbiter_id, slot
                        );
                        return false;
                    }
                    if !verify_partial(&row.decryption, &row.proof, &row.arbiter_key) {
                        warn!(
                            "verify: invalid partial decryption from arbiter {} for slot {}",
                            row.arbiter_id, slot
                        );
                        return false;
                    }
                    true
                })
                .collect();

            match recover_count(
                &aggregate,
                partials.iter().map(|row| &row.decryption),
                &table,
            ) {
                Ok(count) => counts.push(count),
                Err(Error::TallyUndecodable) => {
                    warn!("verify: slot {} did not decode", slot);
                    counts.push(0);
                    ok = false;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(ElectionOutcome { counts, ok })
    }
}
