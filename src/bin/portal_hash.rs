use sheet_portal::login::{hash_password, normalize, sha256_hex};
use std::env;

/// Print the secrets needed to write a portal config
///
/// Usage: `portal-hash <text>`
///
/// The text is normalized the same way the login form normalizes input
/// (trimmed, lower-cased) before hashing.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <text>", args[0]);
        return Ok(());
    }

    let text = normalize(&args[1]);
    println!("sha256 (admin_user / admin_pass / passphrase): {}", sha256_hex(&text));
    println!("argon2 (accounts): {}", hash_password(&text)?);

    Ok(())
}
