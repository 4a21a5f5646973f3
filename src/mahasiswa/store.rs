use axum::async_trait;

use super::repo_types::{Mahasiswa, NewMahasiswa, UniqueField};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("mahasiswa not found")]
    NotFound,

    #[error("duplicate value for unique field {0}")]
    UniqueViolation(UniqueField),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence capabilities the handlers rely on.
///
/// Implementations must enforce `nim`/`email` uniqueness atomically with the
/// write; callers never check-then-insert.
#[async_trait]
pub trait MahasiswaStore: Send + Sync {
    /// All students ordered by id.
    async fn list_all(&self) -> Result<Vec<Mahasiswa>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Mahasiswa>, StoreError>;
    async fn create(&self, fields: &NewMahasiswa) -> Result<Mahasiswa, StoreError>;
    async fn update(&self, id: i64, fields: &NewMahasiswa) -> Result<Mahasiswa, StoreError>;
    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    /// Unique fields whose value is already held by a student other than
    /// `exclude_id`. Only used to complete error reports.
    async fn conflicts(
        &self,
        nim: Option<&str>,
        email: Option<&str>,
        exclude_id: Option<i64>,
    ) -> Result<Vec<UniqueField>, StoreError>;
}
