use sea_query::Iden;

use freighter_core::Manifest;

#[derive(Iden)]
pub enum Manifests {
    Table,
    Repository,
    Target,
    MediaType,
    Blob,
}

#[derive(sqlx::FromRow)]
pub struct ManifestRow {
    pub repository: String,
    pub target: String,
    pub media_type: String,
    pub blob: Vec<u8>,
}

impl From<ManifestRow> for Manifest {
    fn from(row: ManifestRow) -> Manifest {
        Manifest::new(row.repository, row.target, row.media_type, row.blob)
    }
}
