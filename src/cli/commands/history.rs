//! `credvault history` — show a credential's lifecycle entries.

use crate::cli::output;
use crate::cli::{op_context, open_store, Cli};
use crate::errors::Result;

/// Execute the `history` command.
pub async fn execute(cli: &Cli, name: &str) -> Result<()> {
    let store = open_store(cli)?;
    let entries = store.history(&op_context(cli), name).await?;
    output::print_history_table(name, &entries);
    Ok(())
}
