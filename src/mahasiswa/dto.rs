use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for create and update.
///
/// Fields stay raw JSON so that missing keys and wrongly typed values are
/// reported as field violations rather than rejected by the extractor.
#[derive(Debug, Default, Deserialize)]
pub struct MahasiswaPayload {
    #[serde(default)]
    pub nama: Option<Value>,
    #[serde(default)]
    pub nim: Option<Value>,
    #[serde(default)]
    pub email: Option<Value>,
    #[serde(default)]
    pub jurusan: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
