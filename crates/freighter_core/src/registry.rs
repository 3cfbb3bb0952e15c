//! # Manifest Storage Abstractions
//!
//! Defines the contract between a registry front end and the backends that persist manifests.
//!
//! A manifest is addressed within its repository by a *target*, which is either a tag (a mutable
//! alias) or a content digest (an immutable address). Both are plain keys as far as storage is
//! concerned: a registry typically puts the same manifest under its digest and under each of its
//! tags, and the most recent put for a given `(repository, target)` pair always wins.
//!
//! ## Known Implementations
//!
//! ### freighter_backend_memory
//!
//! Nested in-process maps behind a single reader/writer lock. Contents are lost on restart.
//!
//! ### freighter_backend_sqlite
//!
//! A single relational table keyed by `(repository, target)`, accessed through `sqlx` with
//! queries built by `sea_query`. Schema is migrated when the store is constructed.
//!
//! Backends are chosen when the store is constructed, never per call.
use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{Error, Result};

/// A manifest document stored under `(repository, target)`.
///
/// The blob is opaque to storage; `media_type` is carried alongside it so that it can be served
/// back with the right content type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    pub repository: String,
    pub target: String,
    pub media_type: String,
    pub blob: Bytes,
}

impl Manifest {
    pub fn new(
        repository: impl Into<String>,
        target: impl Into<String>,
        media_type: impl Into<String>,
        blob: impl Into<Bytes>,
    ) -> Self {
        Self {
            repository: repository.into(),
            target: target.into(),
            media_type: media_type.into(),
            blob: blob.into(),
        }
    }

    /// Check that both halves of this manifest's storage key are well formed.
    pub fn validate(&self) -> Result<()> {
        validate_repository(&self.repository)?;
        Reference::parse(&self.target)?;
        Ok(())
    }

    /// Number of bytes in the manifest document.
    #[inline]
    pub fn size(&self) -> usize {
        self.blob.len()
    }
}

/// Provides access to manifests across every repository in a registry.
///
/// Implementations serialize writes against each other and against reads; reads may proceed in
/// parallel. Values returned are owned copies, never views into store state.
#[async_trait]
pub trait ManifestStore: Send + Sync + 'static {
    type Error: std::error::Error + Into<Error> + Send + Sync;

    /// Return the manifest stored at `(repository, target)`.
    ///
    /// Fails with [`Error::NotFound`] if either the repository or the target is unknown.
    async fn get(&self, repository: &str, target: &str) -> std::result::Result<Manifest, Self::Error>;

    /// Store `manifest` at the key given by its own `repository` and `target`, replacing whatever
    /// was there before.
    async fn put(&self, manifest: Manifest) -> std::result::Result<(), Self::Error>;

    /// Remove the manifest at `(repository, target)`. Removing an absent key is not an error.
    async fn delete(&self, repository: &str, target: &str) -> std::result::Result<(), Self::Error>;

    /// Return every target in `repository`, sorted.
    ///
    /// Fails with [`Error::NotFound`] if the repository holds no manifests.
    async fn get_tags(&self, repository: &str) -> std::result::Result<Vec<String>, Self::Error>;

    /// Whether a manifest exists at `(repository, target)`. Never fails: malformed keys and
    /// storage faults both read as `false`.
    async fn exists(&self, repository: &str, target: &str) -> bool;

    /// Sorted names of all repositories holding at least one manifest.
    async fn list_repositories(&self) -> Vec<String>;

    /// Every manifest in `repository`, ordered by target, or `None` if the repository holds no
    /// manifests.
    async fn manifests_for_repository(
        &self,
        repository: &str,
    ) -> std::result::Result<Option<Vec<Manifest>>, Self::Error>;
}

/// Classification of a manifest target.
///
/// This refers to the `<reference>` portion of distribution API endpoints taking the form
/// `/v2/<name>/manifests/<reference>`, which must be either a digest of the manifest or a tag of
/// at most 128 characters matching `[a-zA-Z0-9_][a-zA-Z0-9._-]{0,127}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference<'a> {
    Digest(&'a str),
    Tag(&'a str),
}

static DIGEST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[+._-][a-z0-9]+)*:[a-zA-Z0-9=_-]+$").expect("valid digest regex")
});

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_][a-zA-Z0-9._-]{0,127}$").expect("valid tag regex"));

static REPOSITORY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-z0-9]+(?:(?:\.|_|__|-+)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:\.|_|__|-+)[a-z0-9]+)*)*$",
    )
    .expect("valid repository regex")
});

impl<'a> Reference<'a> {
    /// Classify `s` as a digest first, falling back to a tag.
    pub fn parse(s: &'a str) -> Result<Self> {
        if DIGEST_RE.is_match(s) {
            return Ok(Self::Digest(s));
        }
        if TAG_RE.is_match(s) {
            return Ok(Self::Tag(s));
        }
        Err(Error::InvalidArgument(format!("malformed reference: {s:?}")))
    }

    #[inline]
    pub fn is_digest(&self) -> bool {
        matches!(self, Self::Digest(_))
    }

    pub fn as_str(&self) -> &'a str {
        match self {
            Self::Digest(s) | Self::Tag(s) => s,
        }
    }
}

/// Check `name` against the OCI distribution repository name grammar: lowercase alphanumeric
/// path components separated by `/`, each component allowing single `.` or `_`, double `_`, or
/// runs of `-` between alphanumerics.
pub fn validate_repository(name: &str) -> Result<()> {
    if name.len() <= 255 && REPOSITORY_RE.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "malformed repository name: {name:?}"
        )))
    }
}

/// Validate a `(repository, target)` key as a whole.
pub fn validate_key(repository: &str, target: &str) -> Result<()> {
    validate_repository(repository)?;
    Reference::parse(target)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::tag("v1", true, false)]
    #[case::latest("latest", true, false)]
    #[case::underscore_start("_private", true, false)]
    #[case::sha256(
        "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        true,
        true
    )]
    #[case::multipart_algorithm("sha256+b64u:LCa0a2j_xo_5m0U8HTBBNBNCLXBkg7-g-YpeiGJm564", true, true)]
    #[case::empty("", false, false)]
    #[case::leading_dash("-v1", false, false)]
    #[case::slash("v1/evil", false, false)]
    #[case::too_long(&"a".repeat(129), false, false)]
    fn parse_reference(#[case] input: &str, #[case] valid: bool, #[case] digest: bool) {
        match Reference::parse(input) {
            Ok(r) => {
                assert!(valid, "expected {input:?} to be rejected");
                assert_eq!(r.is_digest(), digest);
                assert_eq!(r.as_str(), input);
            }
            Err(e) => {
                assert!(!valid, "expected {input:?} to parse, got {e}");
                assert!(matches!(e, Error::InvalidArgument(_)));
            }
        }
    }

    #[rstest]
    #[case::simple("app", true)]
    #[case::nested("lib/app", true)]
    #[case::separators("my-org/some_app.v2", true)]
    #[case::double_underscore("a__b", true)]
    #[case::uppercase("Lib/App", false)]
    #[case::trailing_slash("lib/", false)]
    #[case::leading_slash("/lib", false)]
    #[case::dot_dot("lib/../etc", false)]
    #[case::empty("", false)]
    fn repository_names(#[case] input: &str, #[case] valid: bool) {
        assert_eq!(validate_repository(input).is_ok(), valid, "{input:?}");
    }

    #[test]
    fn manifest_validation_covers_both_key_halves() {
        assert!(Manifest::new("lib/app", "v1", "application/json", &b"{}"[..])
            .validate()
            .is_ok());
        assert!(Manifest::new("Lib/App", "v1", "application/json", &b"{}"[..])
            .validate()
            .is_err());
        assert!(Manifest::new("lib/app", "", "application/json", &b"{}"[..])
            .validate()
            .is_err());
    }
}
