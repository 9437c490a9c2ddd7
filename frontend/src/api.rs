use gloo_net::http::{Request, RequestBuilder, Response};
use js_sys::{Function, Promise};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{
    endpoints, upload_fields, Batch, CreateDamConnectionRequest, DamConnection, DamSystem,
    DamUploadRequest, DamUploadResponse, ErrorResponse, ExportRequest, ExportResponse,
    Instructions, RetouchRequest, RetouchResponse, StatusResponse, TestConnectionResponse,
    UpdateConnectionStatusRequest, UploadPayload, UploadResponse,
};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{FormData, ProgressEvent, XmlHttpRequest};
use yew::Callback;

use crate::SelectedFile;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
}

fn js_error(value: JsValue) -> ApiError {
    ApiError::Network(format!("{:?}", value))
}

fn decode<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ApiError> {
    if (200..300).contains(&status) {
        return serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()));
    }
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Request failed with status {}", status));
    Err(ApiError::Server { status, message })
}

/// Thin client over the REST backend. No retries: every failure goes back to
/// the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiClient {
    token: Option<String>,
}

impl ApiClient {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header("Authorization", &format!("Bearer {}", token)),
            None => builder,
        }
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        decode(status, &body)
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self
            .authorized(Request::get(url))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::read(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send_json(url, body).await?;
        Self::read(response).await
    }

    async fn send_json<B: Serialize>(&self, url: &str, body: &B) -> Result<Response, ApiError> {
        self.authorized(Request::post(url))
            .json(body)
            .map_err(|e| ApiError::Decode(e.to_string()))?
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }

    /// Sends the batch as multipart form data. `on_progress` receives
    /// `(bytes_sent, bytes_total)` as the browser reports upload progress.
    pub async fn upload(
        &self,
        payload: &UploadPayload<SelectedFile>,
        on_progress: Callback<(u64, u64)>,
    ) -> Result<UploadResponse, ApiError> {
        let form = FormData::new().map_err(js_error)?;
        for image in &payload.images {
            form.append_with_blob_and_filename(
                upload_fields::IMAGES,
                image.file.as_ref(),
                &image.file.name(),
            )
            .map_err(js_error)?;
        }
        match &payload.instructions {
            Instructions::Text(text) => form
                .append_with_str(upload_fields::INSTRUCTIONS, text)
                .map_err(js_error)?,
            Instructions::File(file) => form
                .append_with_blob_and_filename(
                    upload_fields::INSTRUCTION_FILE,
                    file.file.as_ref(),
                    &file.file.name(),
                )
                .map_err(js_error)?,
        }

        let xhr = XmlHttpRequest::new().map_err(js_error)?;
        xhr.open("POST", endpoints::UPLOAD).map_err(js_error)?;
        if let Some(token) = &self.token {
            xhr.set_request_header("Authorization", &format!("Bearer {}", token))
                .map_err(js_error)?;
        }

        let progress = Closure::<dyn FnMut(ProgressEvent)>::new(move |event: ProgressEvent| {
            if event.length_computable() {
                on_progress.emit((event.loaded() as u64, event.total() as u64));
            }
        });
        xhr.upload()
            .map_err(js_error)?
            .set_onprogress(Some(progress.as_ref().unchecked_ref()));

        let finished = Promise::new(&mut |resolve: Function, reject: Function| {
            xhr.set_onload(Some(&resolve));
            xhr.set_onerror(Some(&reject));
            xhr.set_onabort(Some(&reject));
        });
        xhr.send_with_opt_form_data(Some(&form)).map_err(js_error)?;
        let outcome = JsFuture::from(finished).await;
        drop(progress);
        outcome.map_err(|_| ApiError::Network("Upload was interrupted".to_string()))?;

        let status = xhr.status().map_err(js_error)?;
        let body = xhr.response_text().map_err(js_error)?.unwrap_or_default();
        decode(status, &body)
    }

    pub async fn get_status(&self, batch_id: &str) -> Result<StatusResponse, ApiError> {
        self.get(&endpoints::status(batch_id)).await
    }

    pub async fn retouch(
        &self,
        image_id: &str,
        instruction: &str,
    ) -> Result<RetouchResponse, ApiError> {
        let body = RetouchRequest {
            instruction: instruction.to_string(),
        };
        self.post_json(&endpoints::retouch(image_id), &body).await
    }

    pub async fn get_results(&self, batch_id: &str) -> Result<Batch, ApiError> {
        self.get(&endpoints::results(batch_id)).await
    }

    pub async fn export(&self, request: &ExportRequest) -> Result<ExportResponse, ApiError> {
        self.post_json(endpoints::EXPORT, request).await
    }

    pub async fn upload_to_dam(
        &self,
        request: &DamUploadRequest,
    ) -> Result<DamUploadResponse, ApiError> {
        self.post_json(endpoints::DAM_UPLOAD, request).await
    }

    pub async fn get_dam_systems(&self, only_active: bool) -> Result<Vec<DamSystem>, ApiError> {
        self.get(&endpoints::dam_systems(only_active)).await
    }

    pub async fn get_dam_connections(&self) -> Result<Vec<DamConnection>, ApiError> {
        self.get(endpoints::DAM_CONNECTIONS).await
    }

    pub async fn create_dam_connection(
        &self,
        request: &CreateDamConnectionRequest,
    ) -> Result<DamConnection, ApiError> {
        self.post_json(endpoints::DAM_CONNECTIONS, request).await
    }

    pub async fn test_dam_connection(
        &self,
        request: &CreateDamConnectionRequest,
    ) -> Result<TestConnectionResponse, ApiError> {
        self.post_json(endpoints::DAM_CONNECTION_TEST, request).await
    }

    pub async fn update_dam_connection_status(
        &self,
        request: &UpdateConnectionStatusRequest,
    ) -> Result<(), ApiError> {
        let response = self
            .send_json(endpoints::DAM_CONNECTION_STATUS, request)
            .await?;
        if response.ok() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            decode::<serde_json::Value>(status, &body).map(|_| ())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_bodies_surface_the_server_message() {
        let err = decode::<StatusResponse>(404, r#"{"error":"Batch not found"}"#).unwrap_err();
        assert_eq!(
            err,
            ApiError::Server {
                status: 404,
                message: "Batch not found".into()
            }
        );
        assert_eq!(err.to_string(), "Batch not found");
    }

    #[test]
    fn unreadable_error_bodies_fall_back_to_the_status() {
        let err = decode::<StatusResponse>(502, "<html>bad gateway</html>").unwrap_err();
        assert_eq!(err.to_string(), "Request failed with status 502");
    }

    #[test]
    fn success_bodies_are_decoded() {
        let status: StatusResponse =
            decode(200, r#"{"progress":50,"status":"processing","logs":[]}"#).unwrap();
        assert_eq!(status.progress, 50);
        assert!(matches!(
            decode::<StatusResponse>(200, "not json"),
            Err(ApiError::Decode(_))
        ));
    }
}
