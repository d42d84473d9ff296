//! `credvault rotate` — replace a credential's value.

use crate::cli::output;
use crate::cli::{op_context, open_store, read_value, Cli};
use crate::errors::{CredVaultError, Result};

/// Execute the `rotate` command.
pub async fn execute(cli: &Cli, name: &str, value: Option<&str>) -> Result<()> {
    let store = open_store(cli)?;
    let ctx = op_context(cli);

    // Fail before prompting if there is nothing to rotate.
    if !store.exists(&ctx, name).await? {
        return Err(CredVaultError::NotFound(name.to_string()));
    }

    let new_value = read_value(name, value)?;
    let rotated = store.rotate(&ctx, name, &new_value).await?;

    let when = rotated
        .rotated_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    output::success(&format!("Rotated credential '{name}' at {when}"));
    output::tip(&format!("Review with: credvault history {name}"));

    Ok(())
}
