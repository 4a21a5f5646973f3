use axum::async_trait;
use sqlx::PgPool;

use super::repo_types::{Mahasiswa, NewMahasiswa, UniqueField};
use super::store::{MahasiswaStore, StoreError};

const COLUMNS: &str = "id, nama, nim, email, jurusan, created_at, updated_at";

/// Postgres-backed store; uniqueness comes from the table constraints.
#[derive(Clone)]
pub struct PgMahasiswaStore {
    db: PgPool,
}

impl PgMahasiswaStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MahasiswaStore for PgMahasiswaStore {
    async fn list_all(&self) -> Result<Vec<Mahasiswa>, StoreError> {
        let rows = sqlx::query_as::<_, Mahasiswa>(&format!(
            "SELECT {COLUMNS} FROM mahasiswa ORDER BY id ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Mahasiswa>, StoreError> {
        let row = sqlx::query_as::<_, Mahasiswa>(&format!(
            "SELECT {COLUMNS} FROM mahasiswa WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create(&self, fields: &NewMahasiswa) -> Result<Mahasiswa, StoreError> {
        sqlx::query_as::<_, Mahasiswa>(&format!(
            r#"
            INSERT INTO mahasiswa (nama, nim, email, jurusan)
            VALUES ($1, $2, $3, $4)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&fields.nama)
        .bind(&fields.nim)
        .bind(&fields.email)
        .bind(&fields.jurusan)
        .fetch_one(&self.db)
        .await
        .map_err(classify)
    }

    async fn update(&self, id: i64, fields: &NewMahasiswa) -> Result<Mahasiswa, StoreError> {
        sqlx::query_as::<_, Mahasiswa>(&format!(
            r#"
            UPDATE mahasiswa
               SET nama = $2, nim = $3, email = $4, jurusan = $5, updated_at = now()
             WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&fields.nama)
        .bind(&fields.nim)
        .bind(&fields.email)
        .bind(&fields.jurusan)
        .fetch_optional(&self.db)
        .await
        .map_err(classify)?
        .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM mahasiswa WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn conflicts(
        &self,
        nim: Option<&str>,
        email: Option<&str>,
        exclude_id: Option<i64>,
    ) -> Result<Vec<UniqueField>, StoreError> {
        if nim.is_none() && email.is_none() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT nim, email
              FROM mahasiswa
             WHERE (nim = $1 OR email = $2)
               AND ($3::BIGINT IS NULL OR id <> $3)
            "#,
        )
        .bind(nim)
        .bind(email)
        .bind(exclude_id)
        .fetch_all(&self.db)
        .await?;

        let mut out = Vec::new();
        if nim.is_some_and(|n| rows.iter().any(|(r, _)| r == n)) {
            out.push(UniqueField::Nim);
        }
        if email.is_some_and(|e| rows.iter().any(|(_, r)| r == e)) {
            out.push(UniqueField::Email);
        }
        Ok(out)
    }
}

/// Turns a Postgres unique violation (SQLSTATE 23505) on one of our
/// constraints into `UniqueViolation`; everything else stays a database error.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            if let Some(field) = db_err.constraint().and_then(UniqueField::from_constraint) {
                return StoreError::UniqueViolation(field);
            }
        }
    }
    StoreError::Database(err)
}
