use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

use super::dto::{MahasiswaPayload, MessageResponse};
use super::repo_types::{Mahasiswa, NewMahasiswa, UniqueField};
use super::store::{MahasiswaStore, StoreError};
use super::validation::{unique_candidates, validate, ValidationErrors};

const NOT_FOUND: &str = "Mahasiswa tidak ditemukan";
const LIST_EMPTY: &str = "Data mahasiswa tidak ditemukan";
const DELETED: &str = "Mahasiswa berhasil dihapus";

pub fn mahasiswa_routes() -> Router<AppState> {
    Router::new()
        .route("/mahasiswa", get(list_mahasiswa).post(create_mahasiswa))
        .route(
            "/mahasiswa/:id",
            get(show_mahasiswa)
                .put(update_mahasiswa)
                .delete(delete_mahasiswa),
        )
}

#[instrument(skip(state))]
pub async fn list_mahasiswa(State(state): State<AppState>) -> AppResult<Json<Vec<Mahasiswa>>> {
    let all = state.store.list_all().await?;
    if all.is_empty() {
        info!("no mahasiswa stored");
        return Err(AppError::NotFound(LIST_EMPTY));
    }
    Ok(Json(all))
}

#[instrument(skip(state, body))]
pub async fn create_mahasiswa(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Mahasiswa>)> {
    let payload = decode_payload(&body)?;
    let fields = validated(state.store.as_ref(), &payload, None).await?;

    match state.store.create(&fields).await {
        Ok(m) => {
            info!(id = m.id, nim = %m.nim, "mahasiswa created");
            Ok((StatusCode::CREATED, Json(m)))
        }
        Err(StoreError::UniqueViolation(field)) => {
            Err(taken(state.store.as_ref(), &fields, None, field).await)
        }
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(state))]
pub async fn show_mahasiswa(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Mahasiswa>> {
    let m = find_or_404(state.store.as_ref(), &id).await?;
    Ok(Json(m))
}

/// Existence is checked before the body is even decoded.
#[instrument(skip(state, body))]
pub async fn update_mahasiswa(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<Mahasiswa>> {
    let current = find_or_404(state.store.as_ref(), &id).await?;
    let payload = decode_payload(&body)?;
    let fields = validated(state.store.as_ref(), &payload, Some(current.id)).await?;

    match state.store.update(current.id, &fields).await {
        Ok(m) => {
            info!(id = m.id, nim = %m.nim, "mahasiswa updated");
            Ok(Json(m))
        }
        Err(StoreError::NotFound) => Err(AppError::NotFound(NOT_FOUND)),
        Err(StoreError::UniqueViolation(field)) => {
            Err(taken(state.store.as_ref(), &fields, Some(current.id), field).await)
        }
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip(state))]
pub async fn delete_mahasiswa(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let current = find_or_404(state.store.as_ref(), &id).await?;

    match state.store.delete(current.id).await {
        Ok(()) => {
            info!(id = current.id, "mahasiswa deleted");
            Ok(Json(MessageResponse { message: DELETED }))
        }
        Err(StoreError::NotFound) => Err(AppError::NotFound(NOT_FOUND)),
        Err(e) => Err(e.into()),
    }
}

/// An empty body or a JSON value that is not an object yields an empty
/// payload, which then fails validation on every field. Only text that is not
/// JSON at all is rejected outright.
fn decode_payload(body: &[u8]) -> AppResult<MahasiswaPayload> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(MahasiswaPayload::default());
    }
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "request body is not valid JSON");
        AppError::BadRequest("Body JSON tidak valid")
    })?;
    if !value.is_object() {
        return Ok(MahasiswaPayload::default());
    }
    serde_json::from_value(value).map_err(|e| {
        warn!(error = %e, "request body does not match payload shape");
        AppError::BadRequest("Body JSON tidak valid")
    })
}

/// Ids that are not positive integers can never match a row.
fn parse_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

async fn find_or_404(store: &dyn MahasiswaStore, raw_id: &str) -> AppResult<Mahasiswa> {
    let found = match parse_id(raw_id) {
        Some(id) => store.find_by_id(id).await?,
        None => None,
    };
    found.ok_or_else(|| {
        info!(id = %raw_id, "mahasiswa not found");
        AppError::NotFound(NOT_FOUND)
    })
}

/// Runs field validation; on failure, collisions on `nim`/`email` are folded
/// into the same report so the client sees every problem at once.
async fn validated(
    store: &dyn MahasiswaStore,
    payload: &MahasiswaPayload,
    exclude_id: Option<i64>,
) -> AppResult<NewMahasiswa> {
    match validate(payload) {
        Ok(fields) => Ok(fields),
        Err(mut errors) => {
            let (nim, email) = unique_candidates(payload);
            for field in store.conflicts(nim, email, exclude_id).await? {
                errors.add_taken(field);
            }
            warn!(fields = ?errors.fields().collect::<Vec<_>>(), "validation failed");
            Err(AppError::Validation(errors))
        }
    }
}

/// Builds the 400 for a write rejected by a unique constraint. `reported` is
/// the field the store tripped on; any other colliding field is added too.
async fn taken(
    store: &dyn MahasiswaStore,
    fields: &NewMahasiswa,
    exclude_id: Option<i64>,
    reported: UniqueField,
) -> AppError {
    let mut found = store
        .conflicts(Some(&fields.nim), Some(&fields.email), exclude_id)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "conflict lookup failed");
            Vec::new()
        });
    if !found.contains(&reported) {
        found.push(reported);
        found.sort();
    }

    let mut errors = ValidationErrors::default();
    for field in found {
        errors.add_taken(field);
    }
    warn!(fields = ?errors.fields().collect::<Vec<_>>(), "unique constraint rejected write");
    AppError::Validation(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Method, Request},
    };
    use serde_json::json;
    use tower::ServiceExt;

    fn app() -> Router {
        crate::app::build_app(AppState::fake())
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => req
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn student(nama: &str, nim: &str, email: &str) -> Value {
        json!({ "nama": nama, "nim": nim, "email": email, "jurusan": "CS" })
    }

    #[test]
    fn parse_id_accepts_only_positive_integers() {
        assert_eq!(parse_id("1"), Some(1));
        assert_eq!(parse_id("0"), None);
        assert_eq!(parse_id("-3"), None);
        assert_eq!(parse_id("abc"), None);
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let app = app();

        let (status, created) =
            send(&app, Method::POST, "/api/mahasiswa", Some(student("A", "1", "a@x.com"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["id"], 1);
        assert_eq!(created["nama"], "A");
        assert!(created["created_at"].is_string());

        let (status, body) =
            send(&app, Method::POST, "/api/mahasiswa", Some(student("Z", "1", "z@x.com"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Validasi gagal");
        assert_eq!(body["errors"]["nim"][0], "The nim has already been taken.");
        assert!(body["errors"].get("email").is_none());

        let (status, shown) = send(&app, Method::GET, "/api/mahasiswa/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shown, created);

        let (status, updated) = send(
            &app,
            Method::PUT,
            "/api/mahasiswa/1",
            Some(student("B", "1", "a@x.com")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["nama"], "B");
        assert_eq!(updated["id"], 1);

        let (status, body) = send(&app, Method::DELETE, "/api/mahasiswa/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Mahasiswa berhasil dihapus" }));

        let (status, body) = send(&app, Method::GET, "/api/mahasiswa/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "message": "Mahasiswa tidak ditemukan" }));
    }

    #[tokio::test]
    async fn list_is_404_when_empty_then_returns_created() {
        let app = app();

        let (status, body) = send(&app, Method::GET, "/api/mahasiswa", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "message": "Data mahasiswa tidak ditemukan" }));

        let (_, created) =
            send(&app, Method::POST, "/api/mahasiswa", Some(student("A", "1", "a@x.com"))).await;
        let (status, body) = send(&app, Method::GET, "/api/mahasiswa", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([created]));
    }

    #[tokio::test]
    async fn creates_get_distinct_ids() {
        let app = app();
        let mut ids = Vec::new();
        for i in 1..=3 {
            let (status, body) = send(
                &app,
                Method::POST,
                "/api/mahasiswa",
                Some(student("A", &i.to_string(), &format!("s{i}@x.com"))),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            ids.push(body["id"].as_i64().unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn duplicate_email_keeps_only_first() {
        let app = app();
        send(&app, Method::POST, "/api/mahasiswa", Some(student("A", "1", "a@x.com"))).await;

        let (status, body) =
            send(&app, Method::POST, "/api/mahasiswa", Some(student("B", "2", "a@x.com"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["email"][0], "The email has already been taken.");

        let (_, list) = send(&app, Method::GET, "/api/mahasiswa", None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["nama"], "A");
    }

    #[tokio::test]
    async fn invalid_fields_and_collisions_are_reported_together() {
        let app = app();
        send(&app, Method::POST, "/api/mahasiswa", Some(student("A", "1", "a@x.com"))).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/mahasiswa",
            Some(json!({ "nim": "1", "email": "a@x.com", "jurusan": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let errors = &body["errors"];
        assert_eq!(errors["nama"][0], "The nama field is required.");
        assert_eq!(errors["jurusan"][0], "The jurusan field must be a string.");
        assert_eq!(errors["nim"][0], "The nim has already been taken.");
        assert_eq!(errors["email"][0], "The email has already been taken.");
    }

    #[tokio::test]
    async fn update_missing_id_is_404_even_with_invalid_body() {
        let app = app();
        let (status, body) =
            send(&app, Method::PUT, "/api/mahasiswa/42", Some(json!({ "nama": "" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Mahasiswa tidak ditemukan");
    }

    #[tokio::test]
    async fn update_rejects_nim_of_another_student() {
        let app = app();
        send(&app, Method::POST, "/api/mahasiswa", Some(student("A", "1", "a@x.com"))).await;
        send(&app, Method::POST, "/api/mahasiswa", Some(student("B", "2", "b@x.com"))).await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/mahasiswa/1",
            Some(student("A", "2", "a@x.com")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["nim"][0], "The nim has already been taken.");

        let (_, shown) = send(&app, Method::GET, "/api/mahasiswa/1", None).await;
        assert_eq!(shown["nim"], "1");
    }

    #[tokio::test]
    async fn update_with_invalid_body_is_400() {
        let app = app();
        send(&app, Method::POST, "/api/mahasiswa", Some(student("A", "1", "a@x.com"))).await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/mahasiswa/1",
            Some(student("A", "1", "not-an-email")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["errors"]["email"][0],
            "The email field must be a valid email address."
        );
    }

    #[tokio::test]
    async fn unknown_or_malformed_ids_are_404() {
        let app = app();
        for uri in ["/api/mahasiswa/7", "/api/mahasiswa/abc", "/api/mahasiswa/-1"] {
            let (status, _) = send(&app, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        }
        let (status, body) = send(&app, Method::DELETE, "/api/mahasiswa/7", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Mahasiswa tidak ditemukan");
    }

    #[tokio::test]
    async fn health_responds_ok() {
        let app = app();
        let res = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    async fn send_raw(app: &Router, method: Method, uri: &str, body: &'static str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn update_missing_id_without_body_is_404() {
        let app = app();
        for body in ["", "\"x\"", "[1, 2]", "{not json"] {
            let (status, json) = send_raw(&app, Method::PUT, "/api/mahasiswa/42", body).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "body {body:?}");
            assert_eq!(json["message"], "Mahasiswa tidak ditemukan");
        }
    }

    #[tokio::test]
    async fn create_without_body_reports_every_field_required() {
        let app = app();
        for body in ["", "\"x\"", "null"] {
            let (status, json) = send_raw(&app, Method::POST, "/api/mahasiswa", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
            assert_eq!(json["message"], "Validasi gagal");
            for field in ["nama", "nim", "email", "jurusan"] {
                assert_eq!(
                    json["errors"][field][0],
                    format!("The {field} field is required.")
                );
            }
        }
    }

    #[tokio::test]
    async fn update_existing_id_without_body_is_400() {
        let app = app();
        send(&app, Method::POST, "/api/mahasiswa", Some(student("A", "1", "a@x.com"))).await;

        let (status, json) = send_raw(&app, Method::PUT, "/api/mahasiswa/1", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errors"]["nama"][0], "The nama field is required.");
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let app = app();
        let (status, json) = send_raw(&app, Method::POST, "/api/mahasiswa", "{nama:").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, json!({ "message": "Body JSON tidak valid" }));
    }
}
