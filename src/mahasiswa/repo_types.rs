use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Student record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Mahasiswa {
    pub id: i64,
    pub nama: String,
    pub nim: String,
    pub email: String,
    pub jurusan: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated field set for create and update; always non-empty and within limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMahasiswa {
    pub nama: String,
    pub nim: String,
    pub email: String,
    pub jurusan: String,
}

/// The two business keys that must stay unique across students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UniqueField {
    Nim,
    Email,
}

impl UniqueField {
    pub fn as_str(self) -> &'static str {
        match self {
            UniqueField::Nim => "nim",
            UniqueField::Email => "email",
        }
    }

    /// Maps a Postgres constraint name back to the field it guards.
    pub fn from_constraint(name: &str) -> Option<Self> {
        match name {
            "uq_mahasiswa_nim" => Some(UniqueField::Nim),
            "uq_mahasiswa_email" => Some(UniqueField::Email),
            _ => None,
        }
    }
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
