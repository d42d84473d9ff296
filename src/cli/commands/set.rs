//! `credvault set` — create a new credential.

use chrono::Utc;

use crate::cli::output;
use crate::cli::{op_context, open_store, parse_duration, parse_metadata, read_value, Cli, WriteArgs};
use crate::errors::Result;
use crate::vault::{Credential, CredentialType};

/// Execute the `set` command.
pub async fn execute(cli: &Cli, args: &WriteArgs) -> Result<()> {
    let value = read_value(&args.name, args.value.as_deref())?;
    let credential = build_credential(args, value)?;

    let store = open_store(cli)?;
    let ctx = op_context(cli);
    let created = store.set(&ctx, credential).await?;

    let at_rest = if created.encrypted { "encrypted" } else { "plaintext" };
    output::success(&format!(
        "Credential '{}' ({}) stored, {at_rest} at rest",
        created.name, created.kind
    ));
    if !created.encrypted {
        output::tip("Set CREDVAULT_ENCRYPTION_KEY (see `credvault keygen`) to encrypt values.");
    }

    Ok(())
}

/// Assemble a credential from the shared write flags.
pub(crate) fn build_credential(args: &WriteArgs, value: String) -> Result<Credential> {
    let kind = match &args.kind {
        Some(kind) => kind.parse()?,
        None => CredentialType::default(),
    };

    let mut credential = Credential::new(args.name.clone(), kind, value);
    credential.description = args.description.clone().unwrap_or_default();
    credential.tags = args.tags.clone();
    credential.metadata = parse_metadata(&args.meta)?;
    if let Some(expires_in) = &args.expires_in {
        credential.expires_at = Some(Utc::now() + parse_duration(expires_in)?);
    }
    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> WriteArgs {
        WriteArgs {
            name: "stripe".into(),
            value: None,
            kind: Some("token".into()),
            description: Some("payments".into()),
            tags: vec!["prod".into()],
            meta: vec!["owner=billing".into()],
            expires_in: Some("30d".into()),
        }
    }

    #[test]
    fn builds_from_flags() {
        let cred = build_credential(&args(), "sk-abc".into()).unwrap();
        assert_eq!(cred.kind, CredentialType::Token);
        assert_eq!(cred.description, "payments");
        assert_eq!(cred.tags, ["prod"]);
        assert_eq!(cred.metadata["owner"], "billing");
        let remaining = cred.expires_at.unwrap() - Utc::now();
        assert!((remaining.num_days() - 30).abs() <= 1);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut bad = args();
        bad.kind = Some("ssh_key".into());
        assert!(build_credential(&bad, "v".into()).is_err());
    }

    #[test]
    fn type_defaults_to_api_key() {
        let mut plain = args();
        plain.kind = None;
        let cred = build_credential(&plain, "v".into()).unwrap();
        assert_eq!(cred.kind, CredentialType::ApiKey);
    }
}
