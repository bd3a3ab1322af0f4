use std::{fmt::Debug, sync::Arc};

use crate::credential::Credential;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialsError {
    /// Nothing has been stored for the requested token yet.
    #[error("credentials not found for the provided token")]
    CredentialsNotFound,

    /// A rotation could not pick the credential to replace because the store does not hold
    /// exactly one. Fall back to setting credentials for an explicit token.
    #[error("there are {count} set of credentials")]
    InvalidRotationState { count: usize },
}

/// The operations collaborators use to vend and rotate credentials.
///
/// A rotation task is expected to call [block_service](Self::block_service) before fetching
/// new credentials and [unblock_service](Self::unblock_service) afterwards, on every path
/// including failures. Readers that arrive in between wait for the unblock.
pub trait CredentialsService: Debug {
    /// Insert or replace the credentials for `token`. Never waits on a rotation.
    fn set_credentials(
        &self,
        token: &str,
        access_key_id: &str,
        secret_access_key: &str,
        session_token: &str,
    );

    /// Get a copy of the credentials for `token`, waiting while a rotation is in progress.
    fn get_credentials(&self, token: &str) -> Result<Credential, CredentialsError>;

    /// Replace the credentials of the only token in the store.
    fn update_credentials(
        &self,
        access_key_id: &str,
        secret_access_key: &str,
        session_token: &str,
    ) -> Result<(), CredentialsError>;

    /// Stall new reads until [unblock_service](Self::unblock_service). No-op when blocked.
    fn block_service(&self);

    /// Release every stalled read. No-op when not blocked.
    fn unblock_service(&self);
}

impl<T: CredentialsService + ?Sized> CredentialsService for Arc<T> {
    fn set_credentials(
        &self,
        token: &str,
        access_key_id: &str,
        secret_access_key: &str,
        session_token: &str,
    ) {
        (**self).set_credentials(token, access_key_id, secret_access_key, session_token)
    }

    fn get_credentials(&self, token: &str) -> Result<Credential, CredentialsError> {
        (**self).get_credentials(token)
    }

    fn update_credentials(
        &self,
        access_key_id: &str,
        secret_access_key: &str,
        session_token: &str,
    ) -> Result<(), CredentialsError> {
        (**self).update_credentials(access_key_id, secret_access_key, session_token)
    }

    fn block_service(&self) {
        (**self).block_service()
    }

    fn unblock_service(&self) {
        (**self).unblock_service()
    }
}
