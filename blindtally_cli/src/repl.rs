use std::io::{self, BufRead, Write};

/// Minimal interactive loop: prompt, split on whitespace, dispatch.
/// `exit` (or EOF) ends the loop; empty lines are ignored.
pub fn run<F>(prompt: &str, mut handle: F)
where
    F: FnMut(&[&str]),
{
    let stdin = io::stdin();
    loop {
        print!("{}> ", prompt);
        io::stdout().flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => continue,
            ["exit"] => break,
            parts => handle(parts),
        }
    }
}
