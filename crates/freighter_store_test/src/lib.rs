//! Backend-agnostic conformance checks for [`ManifestStore`] implementations.
//!
//! Every backend runs the same checks from its own test module so that observable behaviour
//! (latest-wins puts, idempotent deletes, consistent not-found reporting) stays identical across
//! backends.
use std::sync::Arc;

use bytes::Bytes;

use freighter_core::{Error as CoreError, Manifest, ManifestStore};

mod errors;
pub use errors::{Error, Result};


pub struct StoreTester<S: ManifestStore> {
    store: Arc<S>,
}

impl<S: ManifestStore> StoreTester<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

/// Collapse a backend-specific error into the shared error kinds.
pub(crate) fn core<T, E: Into<CoreError>>(r: std::result::Result<T, E>) -> Result<T> {
    r.map_err(|e| Error::CoreError(e.into()))
}

/// Build a manifest whose blob is the given bytes, tagged with a JSON media type.
pub fn manifest(repository: &str, target: &str, blob: &'static [u8]) -> Manifest {
    Manifest::new(
        repository,
        target,
        "application/vnd.oci.image.manifest.v1+json",
        Bytes::from_static(blob),
    )
}

pub fn assert_manifests_eq(expected: &Manifest, actual: &Manifest) {
    assert_eq!(expected.repository, actual.repository);
    assert_eq!(expected.target, actual.target);
    assert_eq!(expected.media_type, actual.media_type);
    assert_eq!(expected.blob, actual.blob);
}

/// Expect `r` to have failed with [`CoreError::NotFound`].
pub(crate) fn expect_not_found<T: std::fmt::Debug, E: Into<CoreError>>(
    r: std::result::Result<T, E>,
) -> Result<()> {
    match r.map_err(Into::<CoreError>::into) {
        Err(CoreError::NotFound(_)) => Ok(()),
        Err(e) => Err(Error::UnexpectedOutcome {
            expected: String::from("not found"),
            actual: format!("{e}"),
        }),
        Ok(v) => Err(Error::UnexpectedOutcome {
            expected: String::from("not found"),
            actual: format!("Ok({v:?})"),
        }),
    }
}

/// Expect `r` to have failed with [`CoreError::InvalidArgument`].
pub(crate) fn expect_invalid<T: std::fmt::Debug, E: Into<CoreError>>(
    r: std::result::Result<T, E>,
) -> Result<()> {
    match r.map_err(Into::<CoreError>::into) {
        Err(CoreError::InvalidArgument(_)) => Ok(()),
        Err(e) => Err(Error::UnexpectedOutcome {
            expected: String::from("invalid argument"),
            actual: format!("{e}"),
        }),
        Ok(v) => Err(Error::UnexpectedOutcome {
            expected: String::from("invalid argument"),
            actual: format!("Ok({v:?})"),
        }),
    }
}
