use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use crate::archive::{self, ArchiveEntry};
use crate::errors::{Error, Result};
use crate::proto::freighter_server::{Freighter, FreighterServer};
use crate::proto::{DirReply, DirRequest, FileInfo, FileReply, FileRequest};

/// How `GetDir` treats layers that cannot be opened or decoded.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DirListingMode {
    /// Report an unreadable layer (or root) as an empty listing. Entries read before a mid-stream
    /// failure are still returned.
    #[default]
    Lenient,
    /// Surface unreadable layers as `NOT_FOUND` and other faults as `INTERNAL`.
    Strict,
}

/// Serves files and listings out of the layer archives stored directly under `root`.
#[derive(Clone)]
pub struct LayerAccessService {
    root: Arc<PathBuf>,
    listing: DirListingMode,
}

impl LayerAccessService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
            listing: DirListingMode::default(),
        }
    }

    pub fn with_listing_mode(mut self, listing: DirListingMode) -> Self {
        self.listing = listing;
        self
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Path of the archive holding `layer`.
    ///
    /// Layer identifiers must be a single plain path component so that requests can never reach
    /// outside of the root.
    pub fn layer_path(&self, layer: &str) -> Result<PathBuf> {
        let mut components = Path::new(layer).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.root.join(name)),
            _ => Err(Error::InvalidLayerId(layer.to_string())),
        }
    }

    /// Contents of the entry named exactly `path` in `layer`.
    pub async fn read_file(&self, layer: &str, path: &str) -> Result<Vec<u8>> {
        let archive = self.layer_path(layer)?;
        tracing::info!("reading '{path}' from {}", archive.display());

        let layer = layer.to_string();
        let path = path.to_string();
        tokio::task::spawn_blocking(move || archive::read_file(&archive, &layer, &path)).await?
    }

    /// Every entry in `layer`, in stream order. Tar directory entries are reported like any other
    /// entry, with `is_dir` unset.
    pub async fn list_layer(&self, layer: &str) -> Result<Vec<FileInfo>> {
        let archive = self.layer_path(layer)?;
        tracing::info!("listing {}", archive.display());

        let listing = self.listing;
        let layer = layer.to_string();
        tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            let scanned = archive::scan_entries(&archive, &layer, |entry| {
                files.push(FileInfo::from(entry));
            });
            match (scanned, listing) {
                (Ok(()), _) => Ok(files),
                (Err(e), DirListingMode::Lenient) => {
                    tracing::warn!("returning {} entries of unreadable layer: {e}", files.len());
                    Ok(files)
                }
                (Err(e), DirListingMode::Strict) => Err(e),
            }
        })
        .await?
    }

    /// Immediate entries of the layer root. Every entry is reported as a directory whatever its
    /// actual type.
    pub async fn list_root(&self) -> Result<Vec<FileInfo>> {
        match self.read_root().await {
            Ok(files) => Ok(files),
            Err(e) if self.listing == DirListingMode::Lenient => {
                tracing::warn!("unable to read layer root {}: {e}", self.root.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn read_root(&self) -> Result<Vec<FileInfo>> {
        let mut dir = tokio::fs::read_dir(self.root.as_path()).await?;
        let mut files = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let size = match entry.metadata().await {
                Ok(metadata) => metadata.len() as i64,
                Err(e) => {
                    tracing::warn!("unable to stat {}: {e}", entry.path().display());
                    0
                }
            };
            files.push(FileInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                size,
                is_dir: true,
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Wrap this service for registration with a tonic [`Server`].
    pub fn into_server(self) -> FreighterServer<Self> {
        FreighterServer::new(self)
    }
}

impl From<ArchiveEntry> for FileInfo {
    fn from(entry: ArchiveEntry) -> FileInfo {
        FileInfo {
            name: entry.name,
            size: entry.size as i64,
            is_dir: false,
        }
    }
}

#[tonic::async_trait]
impl Freighter for LayerAccessService {
    async fn get_file(
        &self,
        request: Request<FileRequest>,
    ) -> std::result::Result<Response<FileReply>, Status> {
        let req = request.into_inner();
        match self.read_file(&req.container_id, &req.path).await {
            Ok(data) => Ok(Response::new(FileReply { data })),
            Err(e) => {
                tracing::error!("error reading file: {e}");
                Err(e.into())
            }
        }
    }

    async fn get_dir(
        &self,
        request: Request<DirRequest>,
    ) -> std::result::Result<Response<DirReply>, Status> {
        let req = request.into_inner();
        tracing::debug!(path = %req.path, "listing directory");

        let files = if req.path.is_empty() {
            self.list_root().await
        } else {
            self.list_layer(&req.path).await
        };

        match files {
            Ok(files) => Ok(Response::new(DirReply { files })),
            Err(e) => {
                tracing::error!("error listing {:?}: {e}", req.path);
                Err(e.into())
            }
        }
    }
}

/// Serve `service` on `host:port` until the server fails.
pub async fn serve(service: LayerAccessService, host: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    serve_with_listener(service, listener).await
}

/// Serve `service` on an already bound listener.
pub async fn serve_with_listener(service: LayerAccessService, listener: TcpListener) -> Result<()> {
    tracing::info!(
        "serving layers from {} at {}",
        service.root().display(),
        listener.local_addr()?
    );
    Server::builder()
        .add_service(service.into_server())
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use rstest::*;
    use tempfile::TempDir;

    use crate::archive::testutil::{tar_bytes, write_gzip, write_layer};

    use super::*;

    #[fixture]
    fn root() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_layer(
            &dir.path().join("layerA"),
            &[("etc/passwd", &b"root:x\n"[..]), ("bin/sh", &[0u8; 120][..])],
        );
        std::fs::write(dir.path().join("broken"), b"not a layer").unwrap();
        dir
    }

    fn service(root: &TempDir, listing: DirListingMode) -> LayerAccessService {
        LayerAccessService::new(root.path()).with_listing_mode(listing)
    }

    #[rstest]
    #[case::plain("layerA", true)]
    #[case::trailing_separator("layerA/", true)]
    #[case::empty("", false)]
    #[case::nested("a/b", false)]
    #[case::parent("..", false)]
    #[case::current(".", false)]
    #[case::absolute("/etc", false)]
    #[case::escape("../layerA", false)]
    fn layer_identifiers(root: TempDir, #[case] layer: &str, #[case] valid: bool) {
        let svc = service(&root, DirListingMode::Lenient);
        match svc.layer_path(layer) {
            Ok(path) => {
                assert!(valid, "{layer:?} should be rejected");
                assert_eq!(path, root.path().join("layerA"));
            }
            Err(e) => {
                assert!(!valid, "{layer:?} should be accepted: {e}");
                assert!(matches!(e, Error::InvalidLayerId(_)));
            }
        }
    }

    #[rstest]
    #[tokio::test]
    async fn get_file_returns_entry_bytes(root: TempDir) {
        let svc = service(&root, DirListingMode::Lenient);
        let reply = svc
            .get_file(Request::new(FileRequest {
                container_id: String::from("layerA"),
                path: String::from("etc/passwd"),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.data, b"root:x\n");
    }

    #[rstest]
    #[case::missing_entry("layerA", "missing", tonic::Code::NotFound)]
    #[case::missing_layer("layerZ", "etc/passwd", tonic::Code::NotFound)]
    #[case::corrupt_layer("broken", "etc/passwd", tonic::Code::NotFound)]
    #[case::bad_layer_id("../layerA", "etc/passwd", tonic::Code::InvalidArgument)]
    #[tokio::test]
    async fn get_file_failures(
        root: TempDir,
        #[case] layer: &str,
        #[case] path: &str,
        #[case] code: tonic::Code,
    ) {
        let svc = service(&root, DirListingMode::Lenient);
        let status = svc
            .get_file(Request::new(FileRequest {
                container_id: layer.to_string(),
                path: path.to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), code);
    }

    #[rstest]
    #[tokio::test]
    async fn get_dir_lists_layer_entries(root: TempDir) {
        let svc = service(&root, DirListingMode::Strict);
        let files = svc
            .get_dir(Request::new(DirRequest {
                path: String::from("layerA"),
            }))
            .await
            .unwrap()
            .into_inner()
            .files;
        assert_eq!(
            files,
            vec![
                FileInfo {
                    name: String::from("etc/passwd"),
                    size: 7,
                    is_dir: false
                },
                FileInfo {
                    name: String::from("bin/sh"),
                    size: 120,
                    is_dir: false
                },
            ]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn get_dir_lists_root_as_directories(root: TempDir) {
        std::fs::create_dir(root.path().join("subdir")).unwrap();
        let svc = service(&root, DirListingMode::Strict);
        let files = svc
            .get_dir(Request::new(DirRequest {
                path: String::new(),
            }))
            .await
            .unwrap()
            .into_inner()
            .files;

        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["broken", "layerA", "subdir"]);
        assert!(files.iter().all(|f| f.is_dir));
        assert_eq!(files[0].size, b"not a layer".len() as i64);
    }

    #[rstest]
    #[case::corrupt("broken")]
    #[case::missing("layerZ")]
    #[tokio::test]
    async fn lenient_listing_swallows_unreadable_layers(root: TempDir, #[case] layer: &str) {
        let svc = service(&root, DirListingMode::Lenient);
        let files = svc
            .get_dir(Request::new(DirRequest {
                path: layer.to_string(),
            }))
            .await
            .unwrap()
            .into_inner()
            .files;
        assert!(files.is_empty());
    }

    /// A layer whose gzip stream is intact but whose tar stream stops partway through the second
    /// entry's header.
    fn write_truncated_layer(root: &TempDir) {
        let mut raw = tar_bytes(&[("etc/passwd", &b"root:x\n"[..]), ("bin/sh", &[0u8; 120][..])]);
        // first header and its padded data block, then a fragment of the next header
        raw.truncate(512 + 512 + 100);
        write_gzip(&root.path().join("truncated"), &raw);
    }

    #[rstest]
    #[tokio::test]
    async fn lenient_listing_keeps_entries_before_truncation(root: TempDir) {
        write_truncated_layer(&root);
        let svc = service(&root, DirListingMode::Lenient);
        let files = svc
            .get_dir(Request::new(DirRequest {
                path: String::from("truncated"),
            }))
            .await
            .unwrap()
            .into_inner()
            .files;
        assert_eq!(
            files,
            vec![FileInfo {
                name: String::from("etc/passwd"),
                size: 7,
                is_dir: false
            }]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn strict_listing_rejects_truncated_layer(root: TempDir) {
        write_truncated_layer(&root);
        let svc = service(&root, DirListingMode::Strict);
        let status = svc
            .get_dir(Request::new(DirRequest {
                path: String::from("truncated"),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }

    #[rstest]
    #[case::corrupt("broken")]
    #[case::missing("layerZ")]
    #[tokio::test]
    async fn strict_listing_reports_unreadable_layers(root: TempDir, #[case] layer: &str) {
        let svc = service(&root, DirListingMode::Strict);
        let status = svc
            .get_dir(Request::new(DirRequest {
                path: layer.to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }

    #[rstest]
    #[tokio::test]
    async fn missing_root_depends_on_listing_mode(root: TempDir) {
        let gone = root.path().join("gone");

        let lenient = LayerAccessService::new(&gone);
        assert!(lenient.list_root().await.unwrap().is_empty());

        let strict = LayerAccessService::new(&gone).with_listing_mode(DirListingMode::Strict);
        let status: Status = strict.list_root().await.unwrap_err().into();
        assert_eq!(status.code(), tonic::Code::Internal);
    }

    #[rstest]
    #[case::lenient("lenient", DirListingMode::Lenient)]
    #[case::strict("strict", DirListingMode::Strict)]
    fn listing_mode_deserializes_lowercase(#[case] name: &str, #[case] expected: DirListingMode) {
        use serde::de::value::{Error as DeError, StrDeserializer};
        use serde::de::IntoDeserializer;

        let de: StrDeserializer<'_, DeError> = name.into_deserializer();
        assert_eq!(DirListingMode::deserialize(de).unwrap(), expected);
    }
}
