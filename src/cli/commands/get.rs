//! `credvault get` — retrieve and print a single credential.

use crate::cli::{op_context, open_store, Cli};
use crate::errors::{CredVaultError, Result};

/// Execute the `get` command.
pub async fn execute(cli: &Cli, name: &str, json: bool) -> Result<()> {
    let store = open_store(cli)?;
    let credential = store.get(&op_context(cli), name).await?;

    // Print to stdout so the value can be piped.
    if json {
        let rendered = serde_json::to_string_pretty(&credential)
            .map_err(|e| CredVaultError::CommandFailed(format!("json encode: {e}")))?;
        println!("{rendered}");
    } else {
        println!("{}", credential.value);
    }

    Ok(())
}
