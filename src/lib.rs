//! An in-memory cache of short-lived security credentials that can be frozen while the
//! credentials are rotated.
//!
//! # Usage
//!
//! Request handlers read credentials by token while a background task rotates them:
//!
//! ```ignore
//! use std::sync::Arc;
//! use credential_gate::{CredentialGate, CredentialsError};
//!
//! let gate = Arc::new(CredentialGate::new());
//! gate.set_credentials(token, access_key_id, secret_access_key, session_token);
//!
//! // Request handler.
//! match gate.get_credentials(&token) {
//!     Ok(credential) => respond(serde_json::to_string(&credential)?),
//!     Err(CredentialsError::CredentialsNotFound) => respond_not_provisioned(),
//!     Err(e) => return Err(e.into()),
//! }
//!
//! // Rotation task.
//! let rotation = gate.rotation();
//! let fresh = authority.fetch_credentials().await?;
//! rotation.update_credentials(fresh.access_key_id, fresh.secret_access_key, fresh.session_token)?;
//! rotation.finish();
//! ```
//!
//! # Rotation Protocol
//!
//! 1. *Block*: [`CredentialGate::block_service`] (or [`CredentialGate::rotation`]) flips the
//!    service to blocked. Reads already past the gate complete, new reads wait.
//! 2. *Replace*: the rotation stores the new credentials with
//!    [`CredentialGate::update_credentials`] or [`CredentialGate::set_credentials`]. Writes are
//!    never held up by the gate.
//! 3. *Unblock*: [`CredentialGate::unblock_service`] releases every waiting read, each of which
//!    then sees the rotated credentials.
//!
//! A caller using `block_service` directly must call `unblock_service` on every path, failures
//! included, or readers wait forever. A [`Rotation`] does this when it is dropped.
//!
//! Collaborators that should not depend on the concrete gate can take the
//! [`CredentialsService`] trait instead.

pub mod config;
pub mod credential;
pub mod gate;
pub mod rotation;
pub mod service;

pub use config::GateConfig;
pub use credential::Credential;
pub use gate::{CredentialGate, ServiceState};
pub use rotation::Rotation;
pub use service::{CredentialsError, CredentialsService};
