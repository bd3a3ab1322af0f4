use std::collections::HashMap;

use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

use crate::{
    config::GateConfig,
    credential::Credential,
    rotation::Rotation,
    service::{CredentialsError, CredentialsService},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServiceState {
    /// Reads are served.
    #[default]
    Unblocked,
    /// A rotation is in progress, reads wait for it to finish.
    Blocked,
}

#[derive(Debug, Default)]
struct Contents {
    credentials: HashMap<String, Credential>,
    state: ServiceState,
    /// Bumped on every transition to blocked.
    generation: u64,
}

/// An in-memory credential cache whose reads can be frozen while credentials are rotated.
///
/// Every operation takes the content lock for a single map access or flag assignment. Reads
/// additionally wait on the gate while the service is [blocked](ServiceState::Blocked);
/// writes never do, so a rotation can store its new credentials while readers are stalled.
/// Readers released by [unblock_service](Self::unblock_service) re-check the store under the
/// content lock and therefore only ever see the post-rotation credentials.
///
/// There is no timeout: a caller that blocks the service and never unblocks it starves every
/// reader. Prefer [rotation](Self::rotation), which unblocks when dropped.
#[derive(Debug, Default)]
pub struct CredentialGate {
    contents: Mutex<Contents>,
    gate: Condvar,
    config: GateConfig,
}

impl CredentialGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GateConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Insert or replace the credentials for `token`, expiring one credential lifetime from now.
    pub fn set_credentials(
        &self,
        token: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) {
        let token = token.into();
        let credential = self.issue(
            access_key_id.into(),
            secret_access_key.into(),
            session_token.into(),
        );
        debug!(token = %token, expiration = %credential.expiration, "storing credentials");

        self.contents.lock().credentials.insert(token, credential);
    }

    /// Get a copy of the credentials for `token`.
    ///
    /// Waits while the service is blocked.
    pub fn get_credentials(&self, token: &str) -> Result<Credential, CredentialsError> {
        let mut contents = self.contents.lock();
        if contents.state == ServiceState::Blocked {
            debug!(token = %token, "credentials service is blocked, waiting for rotation");
            self.gate
                .wait_while(&mut contents, |c| c.state == ServiceState::Blocked);
        }

        contents
            .credentials
            .get(token)
            .cloned()
            .ok_or(CredentialsError::CredentialsNotFound)
    }

    /// Replace the credentials of the only token in the store, refreshing its expiration.
    ///
    /// Fails with [CredentialsError::InvalidRotationState] rather than guessing when the store
    /// holds zero or several tokens. This does not block the service itself.
    pub fn update_credentials(
        &self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Result<(), CredentialsError> {
        let credential = self.issue(
            access_key_id.into(),
            secret_access_key.into(),
            session_token.into(),
        );

        let mut contents = self.contents.lock();
        let count = contents.credentials.len();
        let (token, current) = match contents.credentials.iter_mut().next() {
            Some(entry) if count == 1 => entry,
            _ => return Err(CredentialsError::InvalidRotationState { count }),
        };
        debug!(token = %token, expiration = %credential.expiration, "rotating credentials");
        *current = credential;

        Ok(())
    }

    /// Stall every subsequent read until [unblock_service](Self::unblock_service).
    ///
    /// No-op when the service is already blocked.
    pub fn block_service(&self) {
        self.block();
    }

    /// Release every read stalled by [block_service](Self::block_service).
    ///
    /// No-op when the service is not blocked, so a stray unblock cannot release a later block
    /// twice.
    pub fn unblock_service(&self) {
        self.unblock(None);
    }

    /// Block the service for the lifetime of the returned [Rotation].
    ///
    /// The service is unblocked when the rotation is finished or dropped, so an early return
    /// or a panic while fetching new credentials cannot starve readers. A rotation only
    /// releases the block it created: if the service was already blocked, or was unblocked and
    /// blocked again by someone else in the meantime, that block is left in place.
    pub fn rotation(&self) -> Rotation<'_> {
        Rotation::begin(self)
    }

    pub fn state(&self) -> ServiceState {
        self.contents.lock().state
    }

    pub fn is_blocked(&self) -> bool {
        self.state() == ServiceState::Blocked
    }

    /// Number of tokens with stored credentials.
    pub fn len(&self) -> usize {
        self.contents.lock().credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether credentials are stored for `token`. Does not wait on a rotation.
    pub fn contains(&self, token: &str) -> bool {
        self.contents.lock().credentials.contains_key(token)
    }

    /// Flip to blocked, returning the generation of the block if this call created it.
    pub(crate) fn block(&self) -> Option<u64> {
        let mut contents = self.contents.lock();
        if contents.state == ServiceState::Blocked {
            return None;
        }
        info!("blocking the credentials service");
        contents.state = ServiceState::Blocked;
        contents.generation += 1;
        Some(contents.generation)
    }

    /// Flip to unblocked and wake waiting readers. With a generation, only the block of that
    /// generation is released. Returns whether this call unblocked the service.
    pub(crate) fn unblock(&self, generation: Option<u64>) -> bool {
        let mut contents = self.contents.lock();
        if contents.state == ServiceState::Unblocked {
            return false;
        }
        if generation.is_some_and(|generation| generation != contents.generation) {
            return false;
        }
        info!("unblocking the credentials service");
        contents.state = ServiceState::Unblocked;
        drop(contents);

        self.gate.notify_all();
        true
    }

    fn issue(
        &self,
        access_key_id: String,
        secret_access_key: String,
        session_token: String,
    ) -> Credential {
        Credential::issued(
            access_key_id,
            secret_access_key,
            session_token,
            Utc::now(),
            *self.config.credential_lifetime,
        )
    }
}

impl CredentialsService for CredentialGate {
    fn set_credentials(
        &self,
        token: &str,
        access_key_id: &str,
        secret_access_key: &str,
        session_token: &str,
    ) {
        CredentialGate::set_credentials(
            self,
            token,
            access_key_id,
            secret_access_key,
            session_token,
        )
    }

    fn get_credentials(&self, token: &str) -> Result<Credential, CredentialsError> {
        CredentialGate::get_credentials(self, token)
    }

    fn update_credentials(
        &self,
        access_key_id: &str,
        secret_access_key: &str,
        session_token: &str,
    ) -> Result<(), CredentialsError> {
        CredentialGate::update_credentials(self, access_key_id, secret_access_key, session_token)
    }

    fn block_service(&self) {
        CredentialGate::block_service(self)
    }

    fn unblock_service(&self) {
        CredentialGate::unblock_service(self)
    }
}
