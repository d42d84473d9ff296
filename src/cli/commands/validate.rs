//! `credvault validate` — score a stored credential.

use crate::cli::output;
use crate::cli::{op_context, open_store, Cli};
use crate::errors::{CredVaultError, Result};

/// Execute the `validate` command.
///
/// Fails when the credential has blocking errors, so scripts can gate on it.
pub async fn execute(cli: &Cli, name: &str) -> Result<()> {
    let store = open_store(cli)?;
    let credential = store.get(&op_context(cli), name).await?;
    let result = store.validate(&credential);

    output::print_validation(name, &result);

    if result.is_valid {
        Ok(())
    } else {
        Err(CredVaultError::CommandFailed(format!(
            "credential '{name}' failed validation"
        )))
    }
}
