use anyhow::Context;
use tracing::{debug, info};

use super::repo_types::NewMahasiswa;
use super::store::{MahasiswaStore, StoreError};

/// (nama, nim, email, jurusan)
const SAMPLES: [(&str, &str, &str, &str); 3] = [
    ("John Doe", "2024001", "john.doe@university.com", "Teknik Informatika"),
    ("Jane Smith", "2024002", "jane.smith@university.com", "Sistem Informasi"),
    ("Bob Johnson", "2024003", "bob.johnson@university.com", "Teknik Komputer"),
];

/// Inserts the demo students. Rows whose `nim` or `email` already exist are
/// skipped, so running it twice is harmless. Returns how many were inserted.
pub async fn seed(store: &dyn MahasiswaStore) -> anyhow::Result<usize> {
    let mut inserted = 0;
    for (nama, nim, email, jurusan) in SAMPLES {
        let fields = NewMahasiswa {
            nama: nama.into(),
            nim: nim.into(),
            email: email.into(),
            jurusan: jurusan.into(),
        };
        match store.create(&fields).await {
            Ok(m) => {
                debug!(id = m.id, nim = %m.nim, "seeded mahasiswa");
                inserted += 1;
            }
            Err(StoreError::UniqueViolation(field)) => {
                debug!(%nim, %field, "seed row already present");
            }
            Err(e) => return Err(e).with_context(|| format!("seed mahasiswa {nim}")),
        }
    }
    info!(inserted, "seed finished");
    Ok(inserted)
}
