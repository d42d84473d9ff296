//! High-level credential operations.
//!
//! `CredentialStore` composes the codec, the cache and the external secret
//! backend into the public lifecycle contract, and reports every call to
//! the audit sink.  Callers work with plain method calls like
//! `store.get(&ctx, "stripe-api")`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::cache::{CredentialCache, DEFAULT_TTL};
use super::codec::CredentialCodec;
use super::context::OpContext;
use super::credential::{
    Credential, CredentialHistoryEntry, CredentialInfo, ValidationResult,
};
use super::history::{HistoryStore, MemoryHistory};
use super::monitor::{MonitorHandle, RotationMonitor};
use super::validation::Validator;
use crate::audit::{
    AuditSink, NoopAuditSink, SecurityEvent, Severity, CATEGORY_ACCESS, CATEGORY_OPERATION,
};
use crate::backend::SecretBackend;
use crate::config::Settings;
use crate::crypto::Cipher;
use crate::errors::{BackendError, CredVaultError, Result};

/// Credential name used in audit events that are not about one credential.
const ALL_CREDENTIALS: &str = "*";

/// The main credential handle.  Build one with `CredentialStore::builder`
/// and share it as `Arc<CredentialStore>`.
pub struct CredentialStore {
    backend: Arc<dyn SecretBackend>,
    codec: CredentialCodec,

    /// Decrypted credentials, owned by this store alone.
    cache: CredentialCache,

    validator: Validator,
    audit: Arc<dyn AuditSink>,
    history: Arc<dyn HistoryStore>,

    namespace: String,
    cache_ttl: Duration,
    op_timeout: Option<Duration>,
    audit_enabled: bool,
    validation_enabled: bool,
    rotation_days: i64,
}

/// Wiring for a [`CredentialStore`].
pub struct CredentialStoreBuilder {
    backend: Arc<dyn SecretBackend>,
    namespace: String,
    prefix: String,
    cipher: Cipher,
    audit: Arc<dyn AuditSink>,
    history: Arc<dyn HistoryStore>,
    validator: Option<Validator>,
    cache_ttl: Duration,
    op_timeout: Option<Duration>,
    audit_enabled: bool,
    validation_enabled: bool,
    rotation_days: i64,
}

impl CredentialStoreBuilder {
    fn new(backend: Arc<dyn SecretBackend>) -> Self {
        let defaults = Settings::default();
        let op_timeout = defaults.op_timeout();
        Self {
            backend,
            namespace: defaults.namespace,
            prefix: defaults.secret_prefix,
            cipher: Cipher::disabled(),
            audit: Arc::new(NoopAuditSink),
            history: Arc::new(MemoryHistory::new()),
            validator: None,
            cache_ttl: DEFAULT_TTL,
            op_timeout,
            audit_enabled: defaults.enable_audit_log,
            validation_enabled: defaults.validation_enabled,
            rotation_days: defaults.auto_rotation_days,
        }
    }

    /// Apply every option from `settings`, including the cipher.
    ///
    /// Fails when encryption is enabled without a usable key.
    pub fn settings(mut self, settings: &Settings) -> Result<Self> {
        self.cipher =
            Cipher::from_config(settings.enable_encryption, settings.encryption_key.as_deref())?;
        self.namespace = settings.namespace.clone();
        self.prefix = settings.secret_prefix.clone();
        self.cache_ttl = settings.cache_ttl();
        self.op_timeout = settings.op_timeout();
        self.audit_enabled = settings.enable_audit_log;
        self.validation_enabled = settings.validation_enabled;
        self.rotation_days = settings.auto_rotation_days;
        Ok(self)
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn cipher(mut self, cipher: Cipher) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn history_store(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = history;
        self
    }

    /// Replace the default validator (default rules, store encryption policy).
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn op_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn audit_enabled(mut self, enabled: bool) -> Self {
        self.audit_enabled = enabled;
        self
    }

    pub fn validation_enabled(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    pub fn rotation_days(mut self, days: i64) -> Self {
        self.rotation_days = days;
        self
    }

    pub fn build(self) -> CredentialStore {
        let encrypts = self.cipher.is_enabled();
        CredentialStore {
            backend: self.backend,
            codec: CredentialCodec::new(self.prefix, self.cipher),
            cache: CredentialCache::new(),
            validator: self.validator.unwrap_or_else(|| Validator::new(encrypts)),
            audit: self.audit,
            history: self.history,
            namespace: self.namespace,
            cache_ttl: self.cache_ttl,
            op_timeout: self.op_timeout,
            audit_enabled: self.audit_enabled,
            validation_enabled: self.validation_enabled,
            rotation_days: self.rotation_days,
        }
    }
}

impl CredentialStore {
    pub fn builder(backend: Arc<dyn SecretBackend>) -> CredentialStoreBuilder {
        CredentialStoreBuilder::new(backend)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Fetch a decrypted credential, from the cache when possible.
    pub async fn get(&self, ctx: &OpContext, name: &str) -> Result<Credential> {
        match self.fetch(ctx, name).await {
            Ok((credential, hit)) => {
                let action = if hit { "cache_hit" } else { "fetch_success" };
                self.log_access(ctx, name, action, None);
                Ok(credential)
            }
            Err(err) => {
                self.log_access(ctx, name, "fetch_error", Some(&err));
                Err(err.context("get", name))
            }
        }
    }

    /// Whether a credential of that name exists. Never decrypts.
    pub async fn exists(&self, ctx: &OpContext, name: &str) -> Result<bool> {
        let result = self.probe(ctx, name).await;
        match &result {
            Ok(_) => self.log_access(ctx, name, "exists_check", None),
            Err(err) => self.log_access(ctx, name, "exists_check", Some(err)),
        }
        result.map_err(|err| err.context("exists", name))
    }

    /// Value-free listing of every managed credential, sorted by name.
    ///
    /// Records that cannot be decoded are skipped with a warning.
    pub async fn list(&self, ctx: &OpContext) -> Result<Vec<CredentialInfo>> {
        let result = self.list_infos(ctx).await;
        match &result {
            Ok(_) => self.log_operation(ctx, ALL_CREDENTIALS, "list_success", None),
            Err(err) => self.log_operation(ctx, ALL_CREDENTIALS, "list_error", Some(err)),
        }
        result.map_err(|err| err.context("list", ALL_CREDENTIALS))
    }

    /// Credentials whose last rotation (or creation) is at least `max_age` old.
    pub async fn stale_credentials(
        &self,
        ctx: &OpContext,
        max_age: chrono::Duration,
    ) -> Result<Vec<CredentialInfo>> {
        let now = Utc::now();
        let infos = self
            .list_infos(ctx)
            .await
            .map_err(|err| err.context("stale_credentials", ALL_CREDENTIALS))?;
        Ok(infos
            .into_iter()
            .filter(|info| now - info.last_rotation() >= max_age)
            .collect())
    }

    /// Lifecycle history of `name`, oldest first.
    pub async fn history(
        &self,
        ctx: &OpContext,
        name: &str,
    ) -> Result<Vec<CredentialHistoryEntry>> {
        let result = self.read_history(ctx, name);
        match &result {
            Ok(_) => self.log_access(ctx, name, "history_read", None),
            Err(err) => self.log_access(ctx, name, "history_read", Some(err)),
        }
        result.map_err(|err| err.context("history", name))
    }

    /// Score `credential` under this store's encryption policy. No I/O.
    pub fn validate(&self, credential: &Credential) -> ValidationResult {
        self.validator.validate(credential)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Create a new credential. Fails with `Conflict` if the name is taken.
    ///
    /// Returns the credential as persisted (timestamps and `encrypted` set).
    pub async fn set(&self, ctx: &OpContext, credential: Credential) -> Result<Credential> {
        let name = credential.name.clone();
        match self.create(ctx, credential).await {
            Ok(created) => {
                self.log_operation(ctx, &name, "create_success", None);
                self.record_history(
                    CredentialHistoryEntry::new(&name, "create", ctx.actor())
                        .with_detail("type", created.kind.as_str()),
                );
                Ok(created)
            }
            Err(err) => {
                self.log_operation(ctx, &name, "create_error", Some(&err));
                Err(err.context("set", &name))
            }
        }
    }

    /// Overwrite an existing credential. Fails with `NotFound` if absent.
    ///
    /// The stored `created_at` and `type` are kept.  `expires_at: None`
    /// clears the stored expiry; `rotated_at: None` keeps the stored one.
    pub async fn update(&self, ctx: &OpContext, credential: Credential) -> Result<Credential> {
        let name = credential.name.clone();
        match self.overwrite(ctx, credential, Utc::now()).await {
            Ok(updated) => {
                self.log_operation(ctx, &name, "update_success", None);
                self.record_history(CredentialHistoryEntry::new(&name, "update", ctx.actor()));
                Ok(updated)
            }
            Err(err) => {
                self.log_operation(ctx, &name, "update_error", Some(&err));
                Err(err.context("update", &name))
            }
        }
    }

    /// Remove a credential. Fails with `NotFound` if absent.
    pub async fn delete(&self, ctx: &OpContext, name: &str) -> Result<()> {
        match self.remove(ctx, name).await {
            Ok(()) => {
                self.log_operation(ctx, name, "delete_success", None);
                self.record_history(CredentialHistoryEntry::new(name, "delete", ctx.actor()));
                Ok(())
            }
            Err(err) => {
                self.log_operation(ctx, name, "delete_error", Some(&err));
                Err(err.context("delete", name))
            }
        }
    }

    /// Replace the value of `name` and stamp the rotation time.
    ///
    /// A failed history append is logged and does not undo the rotation.
    pub async fn rotate(&self, ctx: &OpContext, name: &str, new_value: &str) -> Result<Credential> {
        match self.replace_value(ctx, name, new_value).await {
            Ok((rotated, previous)) => {
                self.log_operation(ctx, name, "rotate_success", None);
                let previous = previous.map_or(serde_json::Value::Null, |t| {
                    serde_json::Value::String(t.to_rfc3339())
                });
                self.record_history(
                    CredentialHistoryEntry::new(name, "rotate", ctx.actor())
                        .with_detail("credential_name", name)
                        .with_detail("rotation_reason", "manual")
                        .with_detail("previous_rotated_at", previous),
                );
                tracing::info!(credential = name, "credential rotated");
                Ok(rotated)
            }
            Err(err) => {
                self.log_operation(ctx, name, "rotate_error", Some(&err));
                Err(err.context("rotate", name))
            }
        }
    }

    // ------------------------------------------------------------------
    // Monitor
    // ------------------------------------------------------------------

    /// Start the background rotation announcer for this store's policy.
    ///
    /// Returns `None` when the policy is 0 days (disabled).
    pub fn start_rotation_monitor(self: &Arc<Self>) -> Option<MonitorHandle> {
        RotationMonitor::spawn(Arc::clone(self), self.rotation_days)
    }

    pub(crate) fn announce_rotation_due(&self, info: &CredentialInfo) {
        tracing::warn!(
            credential = %info.name,
            last_rotation = %info.last_rotation(),
            policy_days = self.rotation_days,
            "credential is due for rotation"
        );
        self.log_operation(&OpContext::background(), &info.name, "rotation_due", None);
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn rotation_days(&self) -> i64 {
        self.rotation_days
    }

    /// Whether values are encrypted at rest.
    pub fn encrypts(&self) -> bool {
        self.codec.encrypts()
    }

    // ------------------------------------------------------------------
    // Unaudited internals
    // ------------------------------------------------------------------

    /// Cache-aware read. The bool is `true` on a cache hit.
    async fn fetch(&self, ctx: &OpContext, name: &str) -> Result<(Credential, bool)> {
        require_name(name)?;

        if let Some(credential) = self.cache.get(name) {
            tracing::debug!(credential = name, "cache hit");
            return Ok((credential, true));
        }

        let epoch = self.cache.epoch();
        let record_name = self.codec.record_name(name)?;
        let record = self
            .call(ctx, name, self.backend.get(&self.namespace, &record_name))
            .await?;
        let credential = self.codec.from_record(&record)?;

        if self
            .cache
            .put_if_current(name, epoch, credential.clone(), self.cache_ttl)
        {
            tracing::debug!(credential = name, "cached after fetch");
        } else {
            tracing::debug!(credential = name, "write raced with fetch, not caching");
        }
        Ok((credential, false))
    }

    async fn probe(&self, ctx: &OpContext, name: &str) -> Result<bool> {
        require_name(name)?;
        if self.cache.get(name).is_some() {
            return Ok(true);
        }
        let record_name = self.codec.record_name(name)?;
        match self
            .call(ctx, name, self.backend.get(&self.namespace, &record_name))
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn list_infos(&self, ctx: &OpContext) -> Result<Vec<CredentialInfo>> {
        let selector = self.codec.selector();
        let records = self
            .call(
                ctx,
                ALL_CREDENTIALS,
                self.backend.list(&self.namespace, &selector),
            )
            .await?;

        let mut infos: Vec<CredentialInfo> = records
            .iter()
            .filter_map(|record| match self.codec.info_from_record(record) {
                Ok(info) => Some(info),
                Err(err) => {
                    tracing::warn!(record = %record.name, error = %err, "skipping undecodable credential record");
                    None
                }
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    fn read_history(&self, ctx: &OpContext, name: &str) -> Result<Vec<CredentialHistoryEntry>> {
        require_name(name)?;
        if ctx.is_cancelled() {
            return Err(CredVaultError::Canceled("context cancelled".into()));
        }
        Ok(self.history.list(name)?)
    }

    async fn create(&self, ctx: &OpContext, mut credential: Credential) -> Result<Credential> {
        require_name(&credential.name)?;
        require_value(&credential.value)?;

        let now = Utc::now();
        if credential.created_at == DateTime::<Utc>::default() {
            credential.created_at = now;
        } else if credential.created_at > now {
            return Err(CredVaultError::InvalidInput(
                "created_at cannot be in the future".into(),
            ));
        }
        credential.updated_at = now;
        credential.encrypted = self.codec.encrypts();
        self.check_valid(&credential)?;

        let record = self.codec.to_record(&credential)?;
        let result = self
            .call(ctx, &credential.name, self.backend.create(&self.namespace, record))
            .await;
        self.cache.invalidate(&credential.name);
        result?;

        tracing::info!(credential = %credential.name, kind = %credential.kind, "credential created");
        Ok(credential)
    }

    /// Persist `credential` over the existing record, stamping `updated_at = at`.
    ///
    /// Only name and value are checked here; an expired credential must stay
    /// updatable so it can be rotated.
    async fn overwrite(
        &self,
        ctx: &OpContext,
        mut credential: Credential,
        at: DateTime<Utc>,
    ) -> Result<Credential> {
        require_name(&credential.name)?;
        require_value(&credential.value)?;

        let name = credential.name.clone();
        let record_name = self.codec.record_name(&name)?;
        let existing = self
            .call(ctx, &name, self.backend.get(&self.namespace, &record_name))
            .await?;
        let stored = self.codec.info_from_record(&existing)?;

        credential.created_at = stored.created_at;
        credential.kind = stored.kind;
        credential.updated_at = at.max(stored.created_at);
        match credential.rotated_at {
            None => credential.rotated_at = stored.rotated_at,
            Some(rotated) if rotated < stored.created_at => {
                return Err(CredVaultError::InvalidInput(
                    "rotated_at cannot precede created_at".into(),
                ));
            }
            Some(_) => {}
        }
        credential.encrypted = self.codec.encrypts();

        let record = self.codec.merge_into(&existing, &credential)?;
        let result = self
            .call(ctx, &name, self.backend.update(&self.namespace, record))
            .await;
        self.cache.invalidate(&name);
        result?;

        tracing::info!(credential = %name, "credential updated");
        Ok(credential)
    }

    async fn remove(&self, ctx: &OpContext, name: &str) -> Result<()> {
        require_name(name)?;
        let record_name = self.codec.record_name(name)?;
        let result = self
            .call(ctx, name, self.backend.delete(&self.namespace, &record_name))
            .await;
        self.cache.invalidate(name);
        result?;

        tracing::info!(credential = name, "credential deleted");
        Ok(())
    }

    /// Returns the rotated credential and its previous `rotated_at`.
    async fn replace_value(
        &self,
        ctx: &OpContext,
        name: &str,
        new_value: &str,
    ) -> Result<(Credential, Option<DateTime<Utc>>)> {
        require_value(new_value)?;

        let (mut credential, _) = self.fetch(ctx, name).await?;
        let previous = credential.rotated_at;

        let now = Utc::now();
        credential.value = new_value.to_string();
        credential.rotated_at = Some(now);
        let rotated = self.overwrite(ctx, credential, now).await?;
        Ok((rotated, previous))
    }

    fn check_valid(&self, credential: &Credential) -> Result<()> {
        if !self.validation_enabled {
            return Ok(());
        }
        let result = self.validator.validate(credential);
        if result.is_valid {
            Ok(())
        } else {
            Err(CredVaultError::InvalidInput(result.errors.join("; ")))
        }
    }

    /// Run one backend call under the context and the store deadline.
    async fn call<T, F>(&self, ctx: &OpContext, name: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, BackendError>>,
    {
        ctx.run(self.op_timeout, fut)
            .await?
            .map_err(|err| backend_error(err, name))
    }

    // ------------------------------------------------------------------
    // Audit / history
    // ------------------------------------------------------------------

    fn log_access(&self, ctx: &OpContext, name: &str, action: &str, error: Option<&CredVaultError>) {
        let severity = if error.is_some() {
            Severity::Warning
        } else {
            Severity::Info
        };
        self.emit(CATEGORY_ACCESS, ctx, name, action, severity, error);
    }

    fn log_operation(
        &self,
        ctx: &OpContext,
        name: &str,
        action: &str,
        error: Option<&CredVaultError>,
    ) {
        let severity = if error.is_some() {
            Severity::Error
        } else {
            Severity::Warning
        };
        self.emit(CATEGORY_OPERATION, ctx, name, action, severity, error);
    }

    fn emit(
        &self,
        category: &str,
        ctx: &OpContext,
        name: &str,
        action: &str,
        severity: Severity,
        error: Option<&CredVaultError>,
    ) {
        if !self.audit_enabled {
            return;
        }
        let event = SecurityEvent::new(
            category,
            name,
            action,
            severity,
            ctx.actor(),
            error.map(|e| e as &dyn std::error::Error),
        );
        if let Err(err) = self.audit.log_security_event(&event) {
            tracing::warn!(credential = name, action, error = %err, "failed to write audit event");
        }
    }

    fn record_history(&self, entry: CredentialHistoryEntry) {
        if let Err(err) = self.history.append(&entry) {
            tracing::warn!(
                credential = %entry.credential,
                action = %entry.action,
                error = %err,
                "failed to append credential history"
            );
        }
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CredVaultError::InvalidInput(
            "credential name is required".into(),
        ));
    }
    Ok(())
}

fn require_value(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CredVaultError::InvalidInput(
            "credential value is required".into(),
        ));
    }
    Ok(())
}

/// Map a backend error onto the credential name the caller used.
fn backend_error(err: BackendError, name: &str) -> CredVaultError {
    match err {
        BackendError::NotFound(_) => CredVaultError::NotFound(name.to_string()),
        BackendError::AlreadyExists(_) => CredVaultError::Conflict(name.to_string()),
        other => CredVaultError::ExternalStore(other),
    }
}
