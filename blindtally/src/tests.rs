use super::*;
use num_bigint_dig::BigUint;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A whole election wired up over loopback TCP: registrar and tallyer
/// listening on ephemeral ports, arbiters with keys on disk, and one shared
/// bulletin board.
struct Election {
    dir: tempfile::TempDir,
    board: Arc<BulletinBoard>,
    registrar: Arc<RegistrarService>,
    tallyer: Arc<TallyerService>,
    registrar_addr: String,
    tallyer_addr: String,
    arbiters: Vec<ArbiterClient>,
    arbiter_key_paths: Vec<PathBuf>,
}

fn setup(arbiter_count: usize) -> Election {
    let mut rng = rand::rngs::OsRng;
    let dir = tempfile::tempdir().unwrap();
    let board = Arc::new(BulletinBoard::in_memory());

    let (registrar_private, registrar_public) = generate_rsa_keypair(&mut rng, 1024).unwrap();
    let (tallyer_private, tallyer_public) = generate_rsa_keypair(&mut rng, 1024).unwrap();
    save_rsa_public_key(&dir.path().join("registrar.pub.pem"), &registrar_public).unwrap();
    save_rsa_public_key(&dir.path().join("tallyer.pub.pem"), &tallyer_public).unwrap();

    let mut arbiters = Vec::new();
    let arbiter_key_paths: Vec<PathBuf> = (0..arbiter_count)
        .map(|i| dir.path().join(format!("arb{}.pk", i)))
        .collect();
    for i in 0..arbiter_count {
        let arbiter = ArbiterClient::new(
            ArbiterConfig {
                arbiter_id: format!("arb-{}", i),
                secret_key_path: dir.path().join(format!("arb{}.sk", i)),
                public_key_path: dir.path().join(format!("arb{}.pk", i)),
                arbiter_key_paths: arbiter_key_paths.clone(),
                registrar_key_path: dir.path().join("registrar.pub.pem"),
                tallyer_key_path: dir.path().join("tallyer.pub.pem"),
            },
            Arc::clone(&board),
        );
        arbiter.keygen(&mut rng).unwrap();
        arbiters.push(arbiter);
    }
    let election_key = load_election_key(&arbiter_key_paths).unwrap();

    let registrar = Arc::new(RegistrarService::new(registrar_private, Arc::clone(&board)));
    let registrar_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let registrar_addr = registrar_listener.local_addr().unwrap().to_string();
    let registrar_handle = Arc::clone(&registrar);
    std::thread::spawn(move || registrar_handle.serve(registrar_listener));

    let tallyer = Arc::new(TallyerService::new(
        tallyer_private,
        registrar_public,
        election_key,
        Arc::clone(&board),
    ));
    let tallyer_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let tallyer_addr = tallyer_listener.local_addr().unwrap().to_string();
    let tallyer_handle = Arc::clone(&tallyer);
    std::thread::spawn(move || tallyer_handle.serve(tallyer_listener));

    Election {
        dir,
        board,
        registrar,
        tallyer,
        registrar_addr,
        tallyer_addr,
        arbiters,
        arbiter_key_paths,
    }
}

impl Election {
    fn voter(&self, id: &str) -> VoterClient {
        VoterClient::new(
            VoterConfig {
                voter_id: id.into(),
                registrar_key_path: self.dir.path().join("registrar.pub.pem"),
                tallyer_key_path: self.dir.path().join("tallyer.pub.pem"),
                arbiter_key_paths: self.arbiter_key_paths.clone(),
                state_path: self.dir.path().join(format!("{}.state", id)),
            },
            Arc::clone(&self.board),
        )
    }

    /// Tallyer handlers run on their own threads; block until the board
    /// holds the expected number of records.
    fn wait_for_ballots(&self, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while self.board.all_ballots().len() < expected {
            assert!(Instant::now() < deadline, "tallyer never recorded ballots");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn run_voters(&self, votes: &[&[u8]]) {
        let mut rng = rand::rngs::OsRng;
        for (i, choice) in votes.iter().enumerate() {
            let voter = self.voter(&format!("voter-{}", i));
            voter.register(&self.registrar_addr, choice).unwrap();
            voter.cast(&self.tallyer_addr).unwrap();
        }
        self.wait_for_ballots(votes.len());
        for arbiter in &self.arbiters {
            arbiter.adjudicate(&mut rng).unwrap();
        }
    }
}

#[test]
fn single_voter_two_candidates() {
    let election = setup(2);
    election.run_voters(&[&[1, 0]]);

    let outcome = election.voter("voter-0").verify().unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.counts, vec![1, 0]);
}

#[test]
fn three_voters_two_candidates() {
    let election = setup(2);
    election.run_voters(&[&[1, 0], &[1, 1], &[0, 1]]);

    let outcome = election.voter("voter-0").verify().unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.counts, vec![2, 2]);
}

#[test]
fn five_candidate_approval_ballot() {
    let election = setup(1);
    election.run_voters(&[&[0, 1, 0, 1, 1]]);

    let outcome = election.voter("voter-0").verify().unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.counts, vec![0, 1, 0, 1, 1]);
}

#[test]
fn replayed_multi_ballot_is_rejected() {
    let election = setup(1);
    let voter = election.voter("voter-0");
    voter.register(&election.registrar_addr, &[1, 0]).unwrap();
    voter.cast(&election.tallyer_addr).unwrap();
    election.wait_for_ballots(1);

    // Casting the identical multi-ballot again dies at the tallyer.
    voter.cast(&election.tallyer_addr).unwrap();
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(election.board.all_ballots().len(), 1);

    // The handler classifies the replay as a policy violation.
    let state = load_voter_state(&election.dir.path().join("voter-0.state")).unwrap();
    let registrar_key =
        load_rsa_public_key(&election.dir.path().join("registrar.pub.pem")).unwrap();
    let ballots = state
        .entries
        .into_iter()
        .map(|entry| {
            let signature =
                unblind(&registrar_key, &entry.blind_signature, &entry.blind_factor).unwrap();
            SignedBallot {
                cipher: entry.cipher,
                proof: entry.proof,
                signature,
            }
        })
        .collect();
    let err = election
        .tallyer
        .record_submission(CastRequest { ballots })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Policy);
}

#[test]
fn tampered_board_record_fails_verification() {
    let election = setup(1);
    election.run_voters(&[&[1, 0], &[0, 1]]);

    // Flip one bit of a stored ciphertext after adjudication.
    let mut records = election.board.all_ballots();
    let partials = election.board.all_partials();
    records[0].ballots[0].cipher.b ^= BigUint::from(1u32);

    election.board.reset().unwrap();
    for record in records {
        election.board.insert_ballot(record).unwrap();
    }
    for row in partials {
        election.board.publish_partial(row).unwrap();
    }

    // The tampered record is dropped (its tallyer signature broke), so the
    // recombined aggregate no longer matches what the arbiters decrypted,
    // and every slot fails to decode.
    let outcome = election.voter("voter-0").verify().unwrap();
    assert!(!outcome.ok);
}

#[test]
fn forged_proof_for_out_of_range_vote_is_rejected() {
    let election = setup(1);
    let mut rng = rand::rngs::OsRng;
    let election_key = load_election_key(&election.arbiter_key_paths).unwrap();
    let registrar_key =
        load_rsa_public_key(&election.dir.path().join("registrar.pub.pem")).unwrap();

    // Encrypt v=2 and pair it with a proof generated for a valid ballot.
    let grp = group();
    let r = grp.rand_scalar(&mut rng);
    let cipher = BallotCipher {
        a: grp.pow_g(&r),
        b: grp.mul(&grp.pow(&election_key, &r), &grp.pow_g(&BigUint::from(2u32))),
    };
    let (_, forged_proof) = generate_ballot(1, &election_key, &mut rng).unwrap();

    // Obtain a genuine registrar authorization for the malformed
    // ciphertext; blind signatures authorize blindly, so this succeeds.
    let blinding = blind(&registrar_key, &cipher, &mut rng).unwrap();
    let reply = election
        .registrar
        .authorize(RegisterRequest {
            voter_id: "mallory".into(),
            blinded: vec![blinding.blinded.clone()],
        })
        .unwrap();
    let signature = unblind(&registrar_key, &reply.signatures[0], &blinding.factor).unwrap();

    // The authorization is valid, but the 0-or-1 proof cannot be.
    let err = election
        .tallyer
        .record_submission(CastRequest {
            ballots: vec![SignedBallot {
                cipher,
                proof: forged_proof,
                signature,
            }],
        })
        .unwrap_err();
    assert!(matches!(err, Error::BallotProofInvalid));
    assert_eq!(err.kind(), ErrorKind::Crypto);
    assert!(election.board.all_ballots().is_empty());
}

#[test]
fn unanimous_approval_counts_every_voter() {
    let election = setup(2);
    election.run_voters(&[&[1], &[1], &[1]]);

    let outcome = election.voter("voter-0").verify().unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.counts, vec![3]);
}

#[test]
fn arbiter_reissue_overwrites_its_partials() {
    let election = setup(2);
    election.run_voters(&[&[1, 1]]);
    let before = election.board.all_partials().len();

    // A second adjudicate pass by the same arbiters replaces rows in place.
    let mut rng = rand::rngs::OsRng;
    for arbiter in &election.arbiters {
        arbiter.adjudicate(&mut rng).unwrap();
    }
    assert_eq!(election.board.all_partials().len(), before);

    let outcome = election.voter("voter-0").verify().unwrap();
    assert!(outcome.ok);
    assert_eq!(outcome.counts, vec![1, 1]);
}
