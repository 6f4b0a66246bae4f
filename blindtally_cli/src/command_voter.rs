use crate::{arbiter_key_paths, open_board, repl};
use blindtally::{VoterClient, VoterConfig};
use std::path::PathBuf;

pub fn run(matches: &clap::ArgMatches) {
    // Unwraps OK - required args
    let config = VoterConfig {
        voter_id: matches.value_of("id").unwrap().to_string(),
        registrar_key_path: PathBuf::from(matches.value_of("registrar-key").unwrap()),
        tallyer_key_path: PathBuf::from(matches.value_of("tallyer-key").unwrap()),
        arbiter_key_paths: arbiter_key_paths(matches),
        state_path: PathBuf::from(matches.value_of("state").unwrap()),
    };

    for path in [&config.registrar_key_path, &config.tallyer_key_path] {
        if !path.exists() {
            eprintln!("blindtally voter: missing key file {}", path.display());
            std::process::exit(1);
        }
    }

    let board = open_board(matches);
    let client = VoterClient::new(config, board);

    repl::run("voter", |parts| match parts {
        ["register", host, port, choices] => {
            let votes = match parse_choices(choices) {
                Some(votes) => votes,
                None => {
                    println!("choices must be a comma-separated 0/1 list, e.g. 1,0,1");
                    return;
                }
            };
            match client.register(&format!("{}:{}", host, port), &votes) {
                Ok(()) => println!("Registered; ballot state saved."),
                Err(err) => println!("register failed: {} ({:?})", err, err.kind()),
            }
        }
        ["vote", host, port] => match client.cast(&format!("{}:{}", host, port)) {
            Ok(()) => println!("Ballot cast."),
            Err(err) => println!("vote failed: {} ({:?})", err, err.kind()),
        },
        ["verify"] => match client.verify() {
            Ok(outcome) if outcome.ok => {
                println!("Election succeeded!");
                for (slot, count) in outcome.counts.iter().enumerate() {
                    println!("Votes for candidate {}: {}", slot, count);
                }
            }
            Ok(_) => println!("Election failed"),
            Err(err) => println!("verify failed: {} ({:?})", err, err.kind()),
        },
        _ => {
            println!("usage: register <host> <port> <comma-separated 0/1 list>");
            println!("       vote <host> <port>");
            println!("       verify");
            println!("       exit");
        }
    });
}

fn parse_choices(choices: &str) -> Option<Vec<u8>> {
    let votes: Option<Vec<u8>> = choices
        .split(',')
        .map(|v| match v.trim() {
            "0" => Some(0),
            "1" => Some(1),
            _ => None,
        })
        .collect();
    votes.filter(|v| !v.is_empty())
}
