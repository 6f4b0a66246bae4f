use clap::AppSettings;
use clap::{App, Arg, SubCommand};

mod command_arbiter;
mod command_keygen;
mod command_registrar;
mod command_tallyer;
mod command_voter;
mod repl;

fn db_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("db")
        .long("db")
        .help("Bulletin board file shared by all principals")
        .takes_value(true)
        .required(true)
}

fn arbiter_keys_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("arbiter-keys")
        .long("arbiter-keys")
        .help("Comma-separated list of every arbiter's public key file")
        .takes_value(true)
        .required(true)
}

fn main() {
    env_logger::init();

    let mut app = App::new("blindtally")
        .version("0.1.0")
        .about("End-to-end verifiable approval voting")
        .setting(AppSettings::ArgRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("keygen")
                .about("Generate an RSA keypair for a registrar or tallyer")
                .arg(
                    Arg::with_name("secret")
                        .long("secret")
                        .help("File location to write the private key (PKCS#8 PEM)")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("public")
                        .long("public")
                        .help("File location to write the public key (SPKI PEM)")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("bits")
                        .long("bits")
                        .help("RSA modulus size; anything under 2048 is insecure")
                        .takes_value(true)
                        .default_value("2048"),
                ),
        )
        .subcommand(
            SubCommand::with_name("voter")
                .about("Interactive voter: register, vote, verify")
                .arg(
                    Arg::with_name("id")
                        .long("id")
                        .help("Voter identifier")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("state")
                        .long("state")
                        .help("File holding the voter's registered ballot state")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("registrar-key")
                        .long("registrar-key")
                        .help("Registrar public key file")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("tallyer-key")
                        .long("tallyer-key")
                        .help("Tallyer public key file")
                        .takes_value(true)
                        .required(true),
                )
                .arg(arbiter_keys_arg())
                .arg(db_arg()),
        )
        .subcommand(
            SubCommand::with_name("registrar")
                .about("Blind-signing authority; binds a port and serves until exit")
                .arg(
                    Arg::with_name("port")
                        .long("port")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("secret")
                        .long("secret")
                        .help("Signing key file; generated if missing")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("public")
                        .long("public")
                        .help("Verification key file; generated if missing")
                        .takes_value(true)
                        .required(true),
                )
                .arg(db_arg()),
        )
        .subcommand(
            SubCommand::with_name("tallyer")
                .about("Ballot ingestion gateway; binds a port and serves until exit")
                .arg(
                    Arg::with_name("port")
                        .long("port")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("secret")
                        .long("secret")
                        .help("Signing key file; generated if missing")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("public")
                        .long("public")
                        .help("Verification key file; generated if missing")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("registrar-key")
                        .long("registrar-key")
                        .help("Registrar public key file")
                        .takes_value(true)
                        .required(true),
                )
                .arg(arbiter_keys_arg())
                .arg(db_arg()),
        )
        .subcommand(
            SubCommand::with_name("arbiter")
                .about("Election trustee: keygen and adjudicate")
                .arg(
                    Arg::with_name("id")
                        .long("id")
                        .help("Arbiter identifier")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("secret")
                        .long("secret")
                        .help("ElGamal secret key file")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("public")
                        .long("public")
                        .help("ElGamal public key file")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("registrar-key")
                        .long("registrar-key")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("tallyer-key")
                        .long("tallyer-key")
                        .takes_value(true)
                        .required(true),
                )
                .arg(arbiter_keys_arg())
                .arg(db_arg()),
        );

    let matches = app.clone().get_matches();

    if let Some(matches) = matches.subcommand_matches("keygen") {
        command_keygen::run(matches);
        std::process::exit(0);
    }
    if let Some(matches) = matches.subcommand_matches("voter") {
        command_voter::run(matches);
        std::process::exit(0);
    }
    if let Some(matches) = matches.subcommand_matches("registrar") {
        command_registrar::run(matches);
        std::process::exit(0);
    }
    if let Some(matches) = matches.subcommand_matches("tallyer") {
        command_tallyer::run(matches);
        std::process::exit(0);
    }
    if let Some(matches) = matches.subcommand_matches("arbiter") {
        command_arbiter::run(matches);
        std::process::exit(0);
    }

    app.print_help().expect("unable to print help message");
    println!();
}

/// Shared helpers for the command modules.
pub fn open_board(matches: &clap::ArgMatches) -> std::sync::Arc<blindtally::BulletinBoard> {
    // Unwrap OK - required arg
    let path = matches.value_of("db").unwrap();
    match blindtally::BulletinBoard::open(path) {
        Ok(board) => std::sync::Arc::new(board),
        Err(err) => {
            eprintln!("blindtally: unable to open board {}: {}", path, err);
            std::process::exit(1);
        }
    }
}

pub fn arbiter_key_paths(matches: &clap::ArgMatches) -> Vec<std::path::PathBuf> {
    // Unwrap OK - required arg
    matches
        .value_of("arbiter-keys")
        .unwrap()
        .split(',')
        .map(std::path::PathBuf::from)
        .collect()
}
