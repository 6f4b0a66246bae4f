use crate::{
    combine_ciphers, generate_keypair, load_election_key, load_integer, load_rsa_public_key,
    partial_decrypt, save_integer, BulletinBoard, ElGamalKeypair, Error, PartialRow,
};
use log::{info, warn};
use rand::{CryptoRng, Rng};
use std::path::PathBuf;
use std::sync::Arc;

/// File locations for one arbiter. `arbiter_key_paths` lists every
/// arbiter's published public key, this one included; their product is the
/// election key.
#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    pub arbiter_id: String,
    pub secret_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub arbiter_key_paths: Vec<PathBuf>,
    pub registrar_key_path: PathBuf,
    pub tallyer_key_path: PathBuf,
}

/// One trustee of the election key. Holds only its config and the board
/// handle; key material is read from disk per command so a late `keygen`
/// by another arbiter is picked up.
pub struct ArbiterClient {
    config: ArbiterConfig,
    board: Arc<BulletinBoard>,
}

impl ArbiterClient {
    pub fn new(config: ArbiterConfig, board: Arc<BulletinBoard>) -> ArbiterClient {
        ArbiterClient { config, board }
    }

    /// Generate and persist this arbiter's ElGamal keypair. Long-term keys
    /// are immutable once created.
    pub fn keygen<R: Rng + CryptoRng>(&self, rng: &mut R) -> Result<(), Error> {
        let keypair = generate_keypair(rng);
        save_integer(&self.config.secret_key_path, &keypair.secret)?;
        save_integer(&self.config.public_key_path, &keypair.public)?;
        info!(
            "arbiter {}: keys written to {} and {}",
            self.config.arbiter_id,
            self.config.secret_key_path.display(),
            self.config.public_key_path.display()
        );
        Ok(())
    }

    /// Re-verify every board record, homomorphically combine the survivors
    /// per candidate slot, and publish one proved partial decryption per
    /// slot. Invalid rows are dropped silently (logged, never fatal);
    /// returns the number of slots published.
    pub fn adjudicate<R: Rng + CryptoRng>(&self, rng: &mut R) -> Result<usize, Error> {
        // Pick up the freshest election key before doing anything else.
        let election_key = load_election_key(&self.config.arbiter_key_paths)?;
        let keypair = ElGamalKeypair {
            secret: load_integer(&self.config.secret_key_path)?,
            public: load_integer(&self.config.public_key_path)?,
        };
        let registrar_key = load_rsa_public_key(&self.config.registrar_key_path)?;
        let tallyer_key = load_rsa_public_key(&self.config.tallyer_key_path)?;

        let mut survivors = Vec::new();
        let mut slots = None;
        for record in self.board.all_ballots() {
            if let Err(err) = record.verify(&registrar_key, &tallyer_key, &election_key) {
                warn!(
                    "arbiter {}: dropping invalid record: {}",
                    self.config.arbiter_id, err
                );
                continue;
            }
            // Every accepted record must agree on the candidate count.
            let t = *slots.get_or_insert(record.ballots.len());
            if record.ballots.len() != t {
                warn!(
                    "arbiter {}: dropping record with {} slots, expected {}",
                    self.config.arbiter_id,
                    record.ballots.len(),
                    t
                );
                continue;
            }
            survivors.push(record);
        }

        let slots = slots.unwrap_or(0);
        for slot in 0..slots {
            let aggregate =
                combine_ciphers(survivors.iter().filter_map(|record| record.cipher(slot)));
            let (decryption, proof) = partial_decrypt(&aggregate, &keypair, rng);
            self.board.publish_partial(PartialRow {
                arbiter_id: self.config.arbiter_id.clone(),
                arbiter_key: keypair.public.clone(),
                slot: slot as u32,
                decryption,
                proof,
            })?;
        }
        info!(
            "arbiter {}: published {} partial decryptions over {} accepted records",
            self.config.arbiter_id,
            slots,
            survivors.len()
        );
        Ok(slots)
    }
}
