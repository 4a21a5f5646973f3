use crate::config::AppConfig;
use crate::mahasiswa::memory::InMemoryMahasiswaStore;
use crate::mahasiswa::repo::PgMahasiswaStore;
use crate::mahasiswa::store::MahasiswaStore;
use anyhow::Context;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn MahasiswaStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match &config.database_url {
            Some(url) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .connect(url)
                    .await
                    .context("connect to database")?;

                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    tracing::warn!(error = %e, "migration failed; continuing");
                }

                Arc::new(PgMahasiswaStore::new(db)) as Arc<dyn MahasiswaStore>
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory store, data is lost on exit");
                Arc::new(InMemoryMahasiswaStore::new()) as Arc<dyn MahasiswaStore>
            }
        };

        Ok(Self { config, store })
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn MahasiswaStore>) -> Self {
        Self { config, store }
    }

    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            db_max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            seed_on_start: false,
        });
        Self::from_parts(config, Arc::new(InMemoryMahasiswaStore::new()))
    }
}
