use std::sync::Arc;

use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, ContentType, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use futures::TryStreamExt;
use ketos_services::{ArchiveUpload, ImportTargets, ModelPackager, ServiceError};
use ketos_shared::Actor;
use serde::Deserialize;

pub const ACTOR_HEADER: &str = "X-Ketos-User";
const UPLOAD_FIELD: &str = "file";

pub struct AppState {
    pub packager: Arc<ModelPackager>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    pub environment_id: Option<i32>,
    pub feature_set_id: Option<i32>,
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

/// Package a model and stream the archive back as a download
pub async fn export_model(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> HttpResponse {
    let model_id = path.into_inner();
    if let Err(response) = actor_from(&req) {
        return response;
    }

    let packaged = match state.packager.package_model(model_id).await {
        Ok(packaged) => packaged,
        Err(e) => return error_response(&format!("Failed to export model {}", model_id), &e),
    };

    match NamedFile::open_async(&packaged.archive_path).await {
        Ok(file) => file
            .set_content_type(ContentType::octet_stream().0)
            .set_content_disposition(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(packaged.file_name)],
            })
            .into_response(&req),
        Err(e) => error_response(
            &format!("Failed to open archive for model {}", model_id),
            &ServiceError::Io(e),
        ),
    }
}

/// Import a model archive uploaded as multipart field `file`
pub async fn import_model(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<ImportQuery>,
    payload: Multipart,
) -> HttpResponse {
    let actor = match actor_from(&req) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let upload = match read_upload(payload, state.max_upload_bytes).await {
        Ok(upload) => upload,
        Err(UploadError::TooLarge) => {
            return HttpResponse::PayloadTooLarge().json(serde_json::json!({
                "error": format!("Upload exceeds {} bytes", state.max_upload_bytes)
            }));
        }
        Err(UploadError::Invalid(e)) => return error_response("Rejected model upload", &e),
    };

    let targets = ImportTargets::new(query.environment_id, query.feature_set_id);
    match state.packager.load_model(upload, targets, actor).await {
        Ok(summary) => HttpResponse::Created().json(summary),
        Err(e) => error_response("Failed to import model", &e),
    }
}

enum UploadError {
    TooLarge,
    Invalid(ServiceError),
}

impl From<ServiceError> for UploadError {
    fn from(e: ServiceError) -> Self {
        UploadError::Invalid(e)
    }
}

async fn read_upload(mut payload: Multipart, limit: usize) -> Result<ArchiveUpload, UploadError> {
    let bad_multipart =
        |e: actix_multipart::MultipartError| ServiceError::BadInput(format!("malformed upload: {}", e));

    while let Some(mut field) = payload.try_next().await.map_err(bad_multipart)? {
        if field.name() != Some(UPLOAD_FIELD) {
            // Drain fields we don't use
            while field.try_next().await.map_err(bad_multipart)?.is_some() {}
            continue;
        }

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or_default()
            .to_string();

        let mut content = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(bad_multipart)? {
            if content.len() + chunk.len() > limit {
                return Err(UploadError::TooLarge);
            }
            content.extend_from_slice(&chunk);
        }
        return Ok(ArchiveUpload::new(&file_name, content)?);
    }

    Err(ServiceError::BadInput(format!("missing multipart field '{}'", UPLOAD_FIELD)).into())
}

/// The auth layer in front of the server identifies callers by header.
fn actor_from(req: &HttpRequest) -> Result<Actor, HttpResponse> {
    let id = req
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i32>().ok());

    match id {
        Some(id) => Ok(Actor { id }),
        None => Err(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": format!("Missing or invalid {} header", ACTOR_HEADER)
        }))),
    }
}

fn error_response(context: &str, e: &ServiceError) -> HttpResponse {
    if e.is_client_error() {
        log::warn!("{}: {}", context, e);
    } else {
        log::error!("{}: {}", context, e);
    }

    let body = serde_json::json!({ "error": e.to_string() });
    match e {
        ServiceError::NotFound { .. } => HttpResponse::NotFound().json(body),
        ServiceError::BadInput(_) => HttpResponse::BadRequest().json(body),
        ServiceError::Conflict(_) => HttpResponse::Conflict().json(body),
        ServiceError::NotReady { .. } => HttpResponse::ServiceUnavailable().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;
    use std::time::Duration;

    #[test]
    fn actor_comes_from_header() {
        let req = TestRequest::default()
            .insert_header((ACTOR_HEADER, "42"))
            .to_http_request();
        assert_eq!(actor_from(&req).unwrap(), Actor { id: 42 });
    }

    #[test]
    fn missing_or_garbled_actor_is_unauthorized() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(actor_from(&req).unwrap_err().status(), StatusCode::UNAUTHORIZED);

        let req = TestRequest::default()
            .insert_header((ACTOR_HEADER, "alice"))
            .to_http_request();
        assert_eq!(actor_from(&req).unwrap_err().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn service_errors_map_to_status_codes() {
        let cases = [
            (ServiceError::not_found("model", 1), StatusCode::NOT_FOUND),
            (ServiceError::BadInput("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                ServiceError::NotReady {
                    endpoint: "env:5000".into(),
                    timeout: Duration::from_secs(1),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ServiceError::Runtime("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error_response("test", &error).status(), status);
        }
    }

    #[actix_web::test]
    async fn health_says_ok() {
        let req = TestRequest::default().to_http_request();
        let response = health().await.respond_to(&req);
        assert_eq!(response.status(), StatusCode::OK);
    }
}
