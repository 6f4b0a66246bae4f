use blindtally::{generate_rsa_keypair, save_rsa_private_key, save_rsa_public_key};
use std::path::Path;

pub fn run(matches: &clap::ArgMatches) {
    // Unwraps OK - required args
    let secret_path = matches.value_of("secret").unwrap();
    let public_path = matches.value_of("public").unwrap();
    let bits: usize = match matches.value_of("bits").unwrap().parse() {
        Ok(bits) => bits,
        Err(_) => {
            eprintln!("blindtally keygen: --bits must be a number");
            std::process::exit(1);
        }
    };

    println!("Generating {}-bit RSA keys, this may take some time...", bits);
    let mut rng = rand::rngs::OsRng;
    let (private, public) = match generate_rsa_keypair(&mut rng, bits) {
        Ok(keys) => keys,
        Err(err) => {
            eprintln!("blindtally keygen: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = save_rsa_private_key(Path::new(secret_path), &private)
        .and_then(|_| save_rsa_public_key(Path::new(public_path), &public))
    {
        eprintln!("blindtally keygen: {}", err);
        std::process::exit(1);
    }
    println!("Keys written to {} and {}", secret_path, public_path);
}
