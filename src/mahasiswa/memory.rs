use std::collections::BTreeMap;

use axum::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use super::repo_types::{Mahasiswa, NewMahasiswa, UniqueField};
use super::store::{MahasiswaStore, StoreError};

/// In-process store used by tests and when no `DATABASE_URL` is configured.
/// Every write checks uniqueness and mutates under the same lock.
#[derive(Default)]
pub struct InMemoryMahasiswaStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    last_id: i64,
    rows: BTreeMap<i64, Mahasiswa>,
}

impl Inner {
    fn collisions(&self, nim: Option<&str>, email: Option<&str>, exclude: Option<i64>) -> Vec<UniqueField> {
        let mut nim_taken = false;
        let mut email_taken = false;
        for m in self.rows.values().filter(|m| Some(m.id) != exclude) {
            nim_taken |= nim == Some(m.nim.as_str());
            email_taken |= email == Some(m.email.as_str());
        }
        let mut out = Vec::new();
        if nim_taken {
            out.push(UniqueField::Nim);
        }
        if email_taken {
            out.push(UniqueField::Email);
        }
        out
    }
}

impl InMemoryMahasiswaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MahasiswaStore for InMemoryMahasiswaStore {
    async fn list_all(&self) -> Result<Vec<Mahasiswa>, StoreError> {
        Ok(self.inner.lock().await.rows.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Mahasiswa>, StoreError> {
        Ok(self.inner.lock().await.rows.get(&id).cloned())
    }

    async fn create(&self, fields: &NewMahasiswa) -> Result<Mahasiswa, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(field) = inner
            .collisions(Some(&fields.nim), Some(&fields.email), None)
            .first()
        {
            return Err(StoreError::UniqueViolation(*field));
        }
        inner.last_id += 1;
        let now = OffsetDateTime::now_utc();
        let row = Mahasiswa {
            id: inner.last_id,
            nama: fields.nama.clone(),
            nim: fields.nim.clone(),
            email: fields.email.clone(),
            jurusan: fields.jurusan.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update(&self, id: i64, fields: &NewMahasiswa) -> Result<Mahasiswa, StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.rows.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if let Some(field) = inner
            .collisions(Some(&fields.nim), Some(&fields.email), Some(id))
            .first()
        {
            return Err(StoreError::UniqueViolation(*field));
        }
        let row = inner.rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        row.nama = fields.nama.clone();
        row.nim = fields.nim.clone();
        row.email = fields.email.clone();
        row.jurusan = fields.jurusan.clone();
        row.updated_at = OffsetDateTime::now_utc();
        Ok(row.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn conflicts(
        &self,
        nim: Option<&str>,
        email: Option<&str>,
        exclude_id: Option<i64>,
    ) -> Result<Vec<UniqueField>, StoreError> {
        Ok(self.inner.lock().await.collisions(nim, email, exclude_id))
    }
}
