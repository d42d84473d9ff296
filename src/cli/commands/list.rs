//! `credvault list` — display all credentials in a table.

use crate::cli::output;
use crate::cli::{op_context, open_store, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub async fn execute(cli: &Cli) -> Result<()> {
    let store = open_store(cli)?;
    let credentials = store.list(&op_context(cli)).await?;

    output::info(&format!(
        "{} namespace — {} credential(s)",
        store.namespace(),
        credentials.len()
    ));

    output::print_credentials_table(&credentials);

    Ok(())
}
