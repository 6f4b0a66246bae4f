use crate::{arbiter_key_paths, command_registrar::load_or_generate, open_board, repl};
use blindtally::{load_election_key, load_rsa_public_key, TallyerService};
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;

pub fn run(matches: &clap::ArgMatches) {
    // Unwraps OK - required args
    let port = matches.value_of("port").unwrap();
    let secret_path = matches.value_of("secret").unwrap();
    let public_path = matches.value_of("public").unwrap();
    let registrar_key_path = matches.value_of("registrar-key").unwrap();

    let signing_key = load_or_generate("tallyer", Path::new(secret_path), Path::new(public_path));

    let registrar_key = match load_rsa_public_key(Path::new(registrar_key_path)) {
        Ok(key) => key,
        Err(err) => {
            eprintln!("blindtally tallyer: registrar key: {}", err);
            std::process::exit(1);
        }
    };
    let election_key = match load_election_key(&arbiter_key_paths(matches)) {
        Ok(key) => key,
        Err(err) => {
            eprintln!("blindtally tallyer: election key: {}", err);
            std::process::exit(1);
        }
    };

    let board = open_board(matches);
    let listener = match TcpListener::bind(format!("0.0.0.0:{}", port)) {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("blindtally tallyer: unable to bind port {}: {}", port, err);
            std::process::exit(1);
        }
    };

    let service = Arc::new(TallyerService::new(
        signing_key,
        registrar_key,
        election_key,
        board,
    ));
    std::thread::spawn(move || service.serve(listener));

    println!("Tallyer listening on port {}; enter \"exit\" to stop.", port);
    repl::run("tallyer", |_| {
        println!("commands: exit");
    });
}
