use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::{debug, info};
use serde::Deserialize;
use shared::{
    upload_fields, CreateDamConnectionRequest, DamUploadRequest, DamUploadResponse, ExportRequest,
    RetouchRequest, UpdateConnectionStatusRequest,
};

use crate::auth::middleware::{AuthMiddleware, AuthenticatedUser};
use crate::batch::batch_service::{BatchService, UploadedImage};
use crate::batch::processor::{spawn_processing, ProcessingSettings};
use crate::dam::connection_service::ConnectionService;
use crate::error::ApiError;
use crate::storage::mime_type_for_key;

pub fn configure_routes(
    cfg: &mut web::ServiceConfig,
    frontend_dir: String,
    auth_middleware: AuthMiddleware,
) {
    cfg.service(
        web::scope("/api")
            .wrap(auth_middleware)
            .route("/upload", web::post().to(upload))
            .route("/status/{batch_id}", web::get().to(get_status))
            .route("/retouch/{image_id}", web::post().to(retouch))
            .route("/results/{batch_id}", web::get().to(get_results))
            .route("/export", web::post().to(export))
            .route("/images/{key:.*}", web::get().to(get_image))
            .route("/dam/upload", web::post().to(dam_upload))
            .route("/dam/systems", web::get().to(dam_systems))
            .route("/dam/connections", web::get().to(list_connections))
            .route("/dam/connections", web::post().to(create_connection))
            .route("/dam/connections/test", web::post().to(test_connection))
            .route("/dam/connections/status", web::post().to(update_connection_status))
            .route("/dam/connections/status", web::patch().to(update_connection_status)),
    )
    .service(Files::new("/", frontend_dir).index_file("index.html"));
}

#[derive(Default)]
struct UploadForm {
    images: Vec<UploadedImage>,
    instructions: Option<String>,
    instruction_file: Option<String>,
}

impl UploadForm {
    /// An instruction file takes precedence over typed text.
    fn into_parts(self) -> (String, Vec<UploadedImage>) {
        let instructions = self
            .instruction_file
            .filter(|text| !text.trim().is_empty())
            .or(self.instructions)
            .unwrap_or_default();
        (instructions, self.images)
    }
}

async fn read_upload_form(mut payload: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::BadRequest(e.to_string()))?;
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            upload_fields::IMAGES if !data.is_empty() => form.images.push(UploadedImage {
                file_name: file_name.unwrap_or_else(|| format!("image-{}", form.images.len() + 1)),
                data,
            }),
            upload_fields::INSTRUCTIONS => {
                form.instructions = Some(String::from_utf8_lossy(&data).into_owned())
            }
            upload_fields::INSTRUCTION_FILE => {
                form.instruction_file = Some(String::from_utf8_lossy(&data).into_owned())
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }
    Ok(form)
}

async fn upload(
    user: AuthenticatedUser,
    batches: web::Data<BatchService>,
    settings: web::Data<ProcessingSettings>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let (instructions, images) = read_upload_form(payload).await?.into_parts();
    info!("Upload of {} image(s) from {}", images.len(), user.0);

    let response = batches.create_batch(instructions, images, &user.0).await?;
    spawn_processing(
        batches.get_ref().clone(),
        response.batch_id.clone(),
        settings.tick,
    );
    Ok(HttpResponse::Created().json(response))
}

async fn get_status(
    batches: web::Data<BatchService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(batches.status(&path)?))
}

async fn get_results(
    batches: web::Data<BatchService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(batches.results(&path)?))
}

async fn retouch(
    user: AuthenticatedUser,
    batches: web::Data<BatchService>,
    path: web::Path<String>,
    body: web::Json<RetouchRequest>,
) -> Result<HttpResponse, ApiError> {
    let response = batches.retouch(&path, &body.instruction, &user.0)?;
    Ok(HttpResponse::Ok().json(response))
}

async fn export(
    user: AuthenticatedUser,
    batches: web::Data<BatchService>,
    body: web::Json<ExportRequest>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(batches.export(&body, &user.0)?))
}

async fn get_image(
    batches: web::Data<BatchService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let key = path.into_inner();
    let data = batches.storage().get(&key).await?;
    Ok(HttpResponse::Ok()
        .content_type(mime_type_for_key(&key))
        .body(data))
}

async fn dam_upload(
    user: AuthenticatedUser,
    batches: web::Data<BatchService>,
    connections: web::Data<ConnectionService>,
    body: web::Json<DamUploadRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    let (deliverable, skipped) = batches.deliverable_images(&request.batch_id, &request.image_ids)?;
    let (connection, uploaded) =
        connections.deliver(&request.dam_config.connection_id, &deliverable)?;
    batches.record_delivery(
        &request.batch_id,
        uploaded.len(),
        &connection.display_name(),
        &user.0,
    );
    Ok(HttpResponse::Ok().json(DamUploadResponse { uploaded, skipped }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SystemsQuery {
    #[serde(default)]
    only_active: bool,
}

async fn dam_systems(
    connections: web::Data<ConnectionService>,
    query: web::Query<SystemsQuery>,
) -> HttpResponse {
    HttpResponse::Ok().json(connections.catalog().systems(query.only_active))
}

async fn list_connections(
    connections: web::Data<ConnectionService>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(connections.list()?))
}

async fn create_connection(
    connections: web::Data<ConnectionService>,
    body: web::Json<CreateDamConnectionRequest>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Created().json(connections.create(&body)?))
}

async fn test_connection(
    connections: web::Data<ConnectionService>,
    body: web::Json<CreateDamConnectionRequest>,
) -> HttpResponse {
    HttpResponse::Ok().json(connections.test(&body).await)
}

async fn update_connection_status(
    connections: web::Data<ConnectionService>,
    body: web::Json<UpdateConnectionStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    connections.update_status(&body)?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtService;
    use crate::auth::models::TokenSubject;
    use crate::dam::catalog::DamCatalog;
    use crate::storage::local_service::LocalService;
    use crate::storage::ImageStorage;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use serde_json::{json, Value};
    use shared::{BatchStatus, StatusResponse, UploadResponse};
    use std::sync::Arc;
    use std::time::Duration;

    const BOUNDARY: &str = "retouch-boundary";
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn services() -> (BatchService, ConnectionService) {
        let root = std::env::temp_dir().join(format!("routes-{}", uuid::Uuid::new_v4()));
        let batches = BatchService::new(ImageStorage::Local(LocalService::new(root)));
        let connections = ConnectionService::new(
            Arc::new(DamCatalog::builtin().unwrap()),
            Duration::from_secs(1),
        );
        (batches, connections)
    }

    macro_rules! app {
        ($batches:expr, $connections:expr, $auth:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($batches.clone()))
                    .app_data(web::Data::new($connections.clone()))
                    .app_data(web::Data::new(ProcessingSettings {
                        tick: Duration::from_secs(3600),
                    }))
                    .configure(|cfg| {
                        configure_routes(
                            cfg,
                            std::env::temp_dir().display().to_string(),
                            $auth,
                        )
                    }),
            )
            .await
        };
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(parts: &[(&str, Option<&str>, &[u8])]) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/upload")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart_body(parts))
    }

    #[actix_web::test]
    async fn upload_then_poll_status() {
        let (batches, connections) = services();
        let app = app!(batches, connections, AuthMiddleware::new(None));

        let req = upload_request(&[
            ("images", Some("a.png"), PNG),
            ("images", Some("b.png"), PNG),
            ("instructions", None, b"remove background"),
        ])
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: UploadResponse = test::read_body_json(resp).await;
        assert_eq!(created.image_count, 2);

        let req = test::TestRequest::get()
            .uri(&format!("/api/status/{}", created.batch_id))
            .to_request();
        let status: StatusResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(status.status, BatchStatus::Queued);

        let batch = batches.results(&created.batch_id).unwrap();
        assert_eq!(batch.instructions, "remove background");
        assert_eq!(batch.images[0].original_name, "a.png");
    }

    #[actix_web::test]
    async fn instruction_file_wins_over_text() {
        let (batches, connections) = services();
        let app = app!(batches, connections, AuthMiddleware::new(None));

        let req = upload_request(&[
            ("images", Some("a.png"), PNG),
            ("instructions", None, b"typed"),
            ("instructionFile", Some("brief.txt"), b"from file"),
        ])
        .to_request();
        let created: UploadResponse = test::call_and_read_body_json(&app, req).await;
        let batch = batches.results(&created.batch_id).unwrap();
        assert_eq!(batch.instructions, "from file");
    }

    #[actix_web::test]
    async fn upload_without_images_is_rejected() {
        let (batches, connections) = services();
        let app = app!(batches, connections, AuthMiddleware::new(None));

        let req = upload_request(&[("instructions", None, b"brighten")]).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "No images provided");
    }

    #[actix_web::test]
    async fn unknown_batch_is_404() {
        let (batches, connections) = services();
        let app = app!(batches, connections, AuthMiddleware::new(None));

        let req = test::TestRequest::get().uri("/api/status/nope").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/api/results/nope").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn retouch_after_processing_and_lookup_of_image_bytes() {
        let (batches, connections) = services();
        let app = app!(batches, connections, AuthMiddleware::new(None));

        let req = upload_request(&[
            ("images", Some("a.png"), PNG),
            ("instructions", None, b"x"),
        ])
        .to_request();
        let created: UploadResponse = test::call_and_read_body_json(&app, req).await;
        batches.process_next(&created.batch_id).unwrap();

        let image_id = format!("{}-img-1", created.batch_id);
        let req = test::TestRequest::post()
            .uri(&format!("/api/retouch/{}", image_id))
            .set_json(json!({"instruction": "warmer tones"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert!(body["processedUrl"].as_str().unwrap().ends_with("?v=2"));

        let original_url = batches.results(&created.batch_id).unwrap().images[0]
            .original_url
            .clone();
        let req = test::TestRequest::get().uri(&original_url).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
    }

    #[actix_web::test]
    async fn dam_flow_lists_systems_and_connections() {
        let (batches, connections) = services();
        let app = app!(batches, connections, AuthMiddleware::new(None));

        let req = test::TestRequest::get()
            .uri("/api/dam/systems?onlyActive=true")
            .to_request();
        let systems: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert!(systems.iter().all(|s| s["isActive"] == true));

        let req = test::TestRequest::post()
            .uri("/api/dam/connections")
            .set_json(json!({
                "SystemCode": "FTP",
                "Endpoint": "ftp.example.com",
                "Port": 21,
                "Username": "u",
                "Password": "p"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get()
            .uri("/api/dam/connections")
            .to_request();
        let listed: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["systemCode"], "FTP");
        let id = listed[0]["connectionId"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri("/api/dam/connections/status")
            .set_json(json!({"connectionId": id, "isActive": false, "isDeleted": true}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(connections.list().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn dam_upload_skips_unprocessed_images() {
        let (batches, connections) = services();
        let app = app!(batches, connections, AuthMiddleware::new(None));

        let req = upload_request(&[
            ("images", Some("a.png"), PNG),
            ("images", Some("b.png"), PNG),
            ("instructions", None, b"x"),
        ])
        .to_request();
        let created: UploadResponse = test::call_and_read_body_json(&app, req).await;
        batches.process_next(&created.batch_id).unwrap();

        let connection: CreateDamConnectionRequest = serde_json::from_value(json!({
            "SystemCode": "SFTP",
            "Endpoint": "files.example.com",
            "Port": 22,
            "Username": "u",
            "Password": "p"
        }))
        .unwrap();
        let connection_id = connections.create(&connection).unwrap().connection_id;

        let first = format!("{}-img-1", created.batch_id);
        let second = format!("{}-img-2", created.batch_id);
        let req = test::TestRequest::post()
            .uri("/api/dam/upload")
            .set_json(json!({
                "imageIds": [first, second],
                "damConfig": {"connectionId": connection_id},
                "batchId": created.batch_id
            }))
            .to_request();
        let response: DamUploadResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(response.uploaded, vec![first]);
        assert_eq!(response.skipped, vec![second]);
    }

    #[actix_web::test]
    async fn api_requires_bearer_token_when_enabled() {
        let (batches, connections) = services();
        let jwt = JwtService::new("test-secret");
        let token = jwt
            .generate_token(&TokenSubject {
                id: "user-1".into(),
                email: "user@example.com".into(),
                name: "User".into(),
            })
            .unwrap();
        let app = app!(batches, connections, AuthMiddleware::new(Some(jwt.clone())));

        let req = test::TestRequest::get().uri("/api/status/nope").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/status/nope")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
