use crate::{open_board, repl};
use blindtally::{
    generate_rsa_keypair, load_rsa_private_key, save_rsa_private_key, save_rsa_public_key,
    RegistrarService, RsaPrivateKey,
};
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;

pub fn run(matches: &clap::ArgMatches) {
    // Unwraps OK - required args
    let port = matches.value_of("port").unwrap();
    let secret_path = matches.value_of("secret").unwrap();
    let public_path = matches.value_of("public").unwrap();

    let signing_key = load_or_generate("registrar", Path::new(secret_path), Path::new(public_path));
    let board = open_board(matches);

    let listener = match TcpListener::bind(format!("0.0.0.0:{}", port)) {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("blindtally registrar: unable to bind port {}: {}", port, err);
            std::process::exit(1);
        }
    };

    let service = Arc::new(RegistrarService::new(signing_key, board));
    std::thread::spawn(move || service.serve(listener));

    println!("Registrar listening on port {}; enter \"exit\" to stop.", port);
    repl::run("registrar", |_| {
        println!("commands: exit");
    });
}

/// Load the server's signing key, generating and persisting a fresh pair if
/// none exists yet.
pub fn load_or_generate(role: &str, secret_path: &Path, public_path: &Path) -> RsaPrivateKey {
    match load_rsa_private_key(secret_path) {
        Ok(key) => key,
        Err(_) => {
            println!("Could not find {} keys, generating them instead.", role);
            let mut rng = rand::rngs::OsRng;
            let (private, public) = match generate_rsa_keypair(&mut rng, 2048) {
                Ok(keys) => keys,
                Err(err) => {
                    eprintln!("blindtally {}: keygen failed: {}", role, err);
                    std::process::exit(1);
                }
            };
            if let Err(err) = save_rsa_private_key(secret_path, &private)
                .and_then(|_| save_rsa_public_key(public_path, &public))
            {
                eprintln!("blindtally {}: unable to save keys: {}", role, err);
                std::process::exit(1);
            }
            private
        }
    }
}
