//! `credvault delete` — remove a credential.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{op_context, open_store, Cli};
use crate::errors::{CredVaultError, Result};

/// Execute the `delete` command.
pub async fn execute(cli: &Cli, name: &str, force: bool) -> Result<()> {
    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete credential '{name}'?"))
            .default(false)
            .interact()
            .map_err(|e| CredVaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    let store = open_store(cli)?;
    store.delete(&op_context(cli), name).await?;

    output::success(&format!("Deleted credential '{name}'"));

    Ok(())
}
