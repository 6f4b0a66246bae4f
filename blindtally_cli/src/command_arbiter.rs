use crate::{arbiter_key_paths, open_board, repl};
use blindtally::{ArbiterClient, ArbiterConfig};
use std::path::PathBuf;

pub fn run(matches: &clap::ArgMatches) {
    // Unwraps OK - required args
    let config = ArbiterConfig {
        arbiter_id: matches.value_of("id").unwrap().to_string(),
        secret_key_path: PathBuf::from(matches.value_of("secret").unwrap()),
        public_key_path: PathBuf::from(matches.value_of("public").unwrap()),
        arbiter_key_paths: arbiter_key_paths(matches),
        registrar_key_path: PathBuf::from(matches.value_of("registrar-key").unwrap()),
        tallyer_key_path: PathBuf::from(matches.value_of("tallyer-key").unwrap()),
    };

    if !config.secret_key_path.exists() {
        println!("Could not find arbiter keys; you might consider running keygen.");
    }

    let board = open_board(matches);
    let client = ArbiterClient::new(config, board);
    let mut rng = rand::rngs::OsRng;

    repl::run("arbiter", |parts| match parts {
        ["keygen"] => match client.keygen(&mut rng) {
            Ok(()) => println!("Keys successfully generated and saved."),
            Err(err) => println!("keygen failed: {} ({:?})", err, err.kind()),
        },
        ["adjudicate"] => match client.adjudicate(&mut rng) {
            Ok(slots) => println!("Published partial decryptions for {} candidate slots.", slots),
            Err(err) => println!("adjudicate failed: {} ({:?})", err, err.kind()),
        },
        _ => {
            println!("usage: keygen");
            println!("       adjudicate");
            println!("       exit");
        }
    });
}
