//! Per-call context: cancellation, deadline, and acting identity.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::errors::CredVaultError;

/// Bounds a store operation's backend calls.
///
/// Cloning shares the cancellation token, so cancelling any clone cancels
/// every operation running under it.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    token: CancellationToken,
    timeout: Option<Duration>,
    actor: Option<String>,
}

impl OpContext {
    /// A context with no deadline of its own; the store default applies.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Identity recorded in audit events and history entries.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Cancel every operation running under this context.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run `fut` unless the context is cancelled or the deadline passes.
    ///
    /// `default_timeout` applies when the context has none of its own.
    pub(crate) async fn run<F, T>(
        &self,
        default_timeout: Option<Duration>,
        fut: F,
    ) -> Result<T, CredVaultError>
    where
        F: Future<Output = T>,
    {
        if self.token.is_cancelled() {
            return Err(CredVaultError::Canceled("context cancelled".into()));
        }

        let bounded = async {
            match self.timeout.or(default_timeout) {
                Some(limit) => tokio::time::timeout(limit, fut)
                    .await
                    .map_err(|_| CredVaultError::Canceled(format!("deadline of {limit:?} exceeded"))),
                None => Ok(fut.await),
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CredVaultError::Canceled("context cancelled".into())),
            result = bounded => result,
        }
    }
}
