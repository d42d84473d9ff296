//! `credvault update` — overwrite an existing credential.

use crate::cli::commands::set::build_credential;
use crate::cli::output;
use crate::cli::{op_context, open_store, read_value, Cli, WriteArgs};
use crate::errors::Result;

/// Execute the `update` command.
///
/// Value, description, tags, metadata and expiry are replaced as given;
/// the stored type and creation time are kept.
pub async fn execute(cli: &Cli, args: &WriteArgs) -> Result<()> {
    if args.kind.is_some() {
        output::warning("--type is ignored by update; the stored type is kept.");
    }

    let value = read_value(&args.name, args.value.as_deref())?;
    let credential = build_credential(args, value)?;

    let store = open_store(cli)?;
    let ctx = op_context(cli);
    let updated = store.update(&ctx, credential).await?;

    output::success(&format!("Credential '{}' updated", updated.name));
    Ok(())
}
