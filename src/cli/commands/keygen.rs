//! `credvault keygen` — print a fresh encryption key.

use crate::cli::output;
use crate::crypto::EncryptionKey;
use crate::errors::Result;

/// Execute the `keygen` command.
///
/// The key goes to stdout alone so it can be captured; hints go to stderr.
pub fn execute() -> Result<()> {
    let key = EncryptionKey::generate();
    println!("{}", key.to_base64());
    output::warning("Store this key safely: credentials encrypted with it cannot be recovered without it.");
    eprintln!("  export CREDVAULT_ENCRYPTION_KEY=<key>");
    Ok(())
}
