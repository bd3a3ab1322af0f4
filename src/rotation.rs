use tracing::warn;

use crate::{gate::CredentialGate, service::CredentialsError};

/// A credential rotation in progress, see [CredentialGate::rotation].
///
/// Reads on the gate wait until the rotation is [finished](Rotation::finish) or dropped.
#[must_use = "dropping a rotation immediately unblocks the credentials service"]
#[derive(Debug)]
pub struct Rotation<'a> {
    gate: &'a CredentialGate,
    /// Generation of the block this rotation created, if any.
    block: Option<u64>,
    finished: bool,
}

impl<'a> Rotation<'a> {
    pub(crate) fn begin(gate: &'a CredentialGate) -> Self {
        Self {
            gate,
            block: gate.block(),
            finished: false,
        }
    }

    /// Store the rotated credentials for `token`.
    pub fn set_credentials(
        &self,
        token: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) {
        self.gate
            .set_credentials(token, access_key_id, secret_access_key, session_token)
    }

    /// Replace the credentials of the only token in the store.
    pub fn update_credentials(
        &self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Result<(), CredentialsError> {
        self.gate
            .update_credentials(access_key_id, secret_access_key, session_token)
    }

    /// End the rotation and release waiting readers.
    pub fn finish(mut self) {
        self.finished = true;
        self.release();
    }

    /// Returns whether the service was unblocked.
    fn release(&mut self) -> bool {
        self.block
            .take()
            .is_some_and(|generation| self.gate.unblock(Some(generation)))
    }
}

impl Drop for Rotation<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let outcome = if std::thread::panicking() {
            "panicked"
        } else {
            "abandoned"
        };
        if self.release() {
            warn!("credential rotation {outcome}, unblocked the credentials service");
        } else {
            warn!("credential rotation {outcome}, credentials service block left to its owner");
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        panic::{self, AssertUnwindSafe},
        sync::{mpsc, Arc},
        thread,
        time::Duration,
    };

    use crate::{gate::ServiceState, CredentialGate};

    #[test]
    fn finish_unblocks() {
        let gate = CredentialGate::new();
        gate.set_credentials("tok1", "AK", "SK", "ST");

        let rotation = gate.rotation();
        assert!(gate.is_blocked());
        rotation.update_credentials("AK2", "SK2", "ST2").unwrap();
        rotation.finish();

        assert_eq!(gate.state(), ServiceState::Unblocked);
        assert_eq!(gate.get_credentials("tok1").unwrap().access_key_id, "AK2");
    }

    #[test]
    fn failed_rotation_still_unblocks() {
        fn rotate(gate: &CredentialGate) -> Result<(), crate::CredentialsError> {
            let rotation = gate.rotation();
            rotation.update_credentials("AK2", "SK2", "ST2")?;
            rotation.finish();
            Ok(())
        }

        let gate = CredentialGate::new();
        assert!(rotate(&gate).is_err());
        assert_eq!(gate.state(), ServiceState::Unblocked);
    }

    #[test]
    fn panicking_rotation_still_unblocks() {
        let gate = CredentialGate::new();
        gate.set_credentials("tok1", "AK", "SK", "ST");

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _rotation = gate.rotation();
            panic!("upstream authority unreachable");
        }));

        assert!(result.is_err());
        assert_eq!(gate.state(), ServiceState::Unblocked);
        assert!(gate.get_credentials("tok1").is_ok());
    }

    #[test]
    fn nested_rotation_leaves_outer_block() {
        let gate = CredentialGate::new();
        gate.block_service();

        gate.rotation().finish();
        assert!(gate.is_blocked());

        gate.unblock_service();
        assert!(!gate.is_blocked());
    }

    #[test]
    fn abandoned_nested_rotation_leaves_outer_block() {
        let gate = CredentialGate::new();
        gate.block_service();

        drop(gate.rotation());
        assert!(gate.is_blocked());
    }

    #[test]
    fn stale_rotation_leaves_newer_block() {
        let gate = CredentialGate::new();
        gate.set_credentials("tok1", "AK", "SK", "ST");

        let stale = gate.rotation();
        gate.unblock_service();
        gate.block_service();

        stale.finish();
        assert!(gate.is_blocked());

        gate.unblock_service();
        assert!(gate.get_credentials("tok1").is_ok());
    }

    #[test]
    fn rotation_after_stale_unblock_owns_its_block() {
        let gate = CredentialGate::new();

        let first = gate.rotation();
        gate.unblock_service();
        let second = gate.rotation();

        drop(first);
        assert!(gate.is_blocked());

        second.finish();
        assert!(!gate.is_blocked());
    }

    #[test]
    fn readers_wait_for_rotation() {
        let gate = Arc::new(CredentialGate::new());
        gate.set_credentials("tok1", "AK", "SK", "ST");

        let rotation = gate.rotation();
        let (tx, rx) = mpsc::channel();
        let reader = {
            let gate = gate.clone();
            thread::spawn(move || tx.send(gate.get_credentials("tok1")).unwrap())
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        rotation.set_credentials("tok1", "AK2", "SK2", "ST2");
        rotation.finish();

        assert_eq!(rx.recv().unwrap().unwrap().access_key_id, "AK2");
        reader.join().unwrap();
    }
}
