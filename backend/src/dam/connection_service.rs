use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use shared::{
    dam::to_pascal_case, CreateDamConnectionRequest, DamConnection, DamSystem, DamSystemCode,
    FieldKind, Image, StoreError, TestConnectionResponse, UpdateConnectionStatusRequest,
};
use tokio::net::TcpStream;
use url::Url;
use uuid::Uuid;

use super::catalog::DamCatalog;
use crate::error::ApiError;

const REDACTED: &str = "********";

#[derive(Debug, Clone)]
struct StoredConnection {
    connection: DamConnection,
    is_deleted: bool,
}

/// Connections created through the API. Deleted connections are kept but
/// never listed.
#[derive(Clone)]
pub struct ConnectionService {
    catalog: Arc<DamCatalog>,
    connections: Arc<RwLock<Vec<StoredConnection>>>,
    http: reqwest::Client,
    probe_timeout: Duration,
}

impl ConnectionService {
    pub fn new(catalog: Arc<DamCatalog>, probe_timeout: Duration) -> Self {
        Self {
            catalog,
            connections: Arc::new(RwLock::new(Vec::new())),
            http: reqwest::Client::new(),
            probe_timeout,
        }
    }

    pub fn catalog(&self) -> &DamCatalog {
        &self.catalog
    }

    fn system(&self, code: DamSystemCode) -> Result<&DamSystem, ApiError> {
        match self.catalog.get(code) {
            Some(system) if system.is_active => Ok(system),
            Some(_) => Err(ApiError::BadRequest(format!("{} is not available", code))),
            None => Err(ApiError::BadRequest(format!("Unknown system {}", code))),
        }
    }

    /// Checks the request against the provider's form definition.
    pub fn validate(&self, request: &CreateDamConnectionRequest) -> Result<(), ApiError> {
        let system = self.system(request.system_code)?;
        for field in system.fields.iter().filter(|f| f.required) {
            let present = match request.fields.get(&to_pascal_case(&field.key)) {
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(Value::Null) | None => false,
                Some(_) => true,
            };
            if !present {
                return Err(ApiError::BadRequest(format!("{} is required", field.label)));
            }
        }
        if request.endpoint().map_or(true, |e| e.trim().is_empty()) {
            return Err(ApiError::BadRequest("Endpoint is required".to_string()));
        }
        Ok(())
    }

    /// Validates the request and checks that its endpoint is reachable.
    pub async fn test(&self, request: &CreateDamConnectionRequest) -> TestConnectionResponse {
        let outcome = match self.validate(request) {
            Ok(()) => self.probe(request).await,
            Err(e) => Err(e.to_string()),
        };
        match outcome {
            Ok(message) => TestConnectionResponse {
                success: true,
                message,
            },
            Err(message) => {
                log::warn!("Connection test for {} failed: {}", request.system_code, message);
                TestConnectionResponse {
                    success: false,
                    message,
                }
            }
        }
    }

    async fn probe(&self, request: &CreateDamConnectionRequest) -> Result<String, String> {
        let endpoint = request.endpoint().unwrap_or_default().trim();
        if request.system_code.is_file_transfer() {
            let (host, endpoint_port) = tcp_target(endpoint)?;
            let port = request
                .port()
                .or(endpoint_port)
                .or(request.system_code.default_port())
                .ok_or_else(|| "Port is required".to_string())?;
            let connect = TcpStream::connect((host.as_str(), port));
            match tokio::time::timeout(self.probe_timeout, connect).await {
                Ok(Ok(_)) => Ok(format!("Reached {}:{}", host, port)),
                Ok(Err(e)) => Err(format!("Could not connect to {}:{}: {}", host, port, e)),
                Err(_) => Err(format!("Timed out connecting to {}:{}", host, port)),
            }
        } else {
            let url = Url::parse(endpoint).map_err(|e| format!("Invalid endpoint URL: {}", e))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(format!("Unsupported URL scheme: {}", url.scheme()));
            }
            let response = self
                .http
                .head(url.clone())
                .timeout(self.probe_timeout)
                .send()
                .await
                .map_err(|e| format!("Could not reach {}: {}", url, e))?;
            if response.status().is_server_error() {
                Err(format!("{} answered {}", url, response.status()))
            } else {
                Ok(format!("Reached {}", url))
            }
        }
    }

    pub fn create(&self, request: &CreateDamConnectionRequest) -> Result<DamConnection, ApiError> {
        self.validate(request)?;
        let connection = DamConnection {
            connection_id: Uuid::new_v4().to_string(),
            system_code: Some(request.system_code),
            configuration: request.configuration(),
            endpoint: request.endpoint().unwrap_or_default().trim().to_string(),
            is_active: true,
        };
        self.connections
            .write()
            .map_err(|_| ApiError::Internal("connection lock poisoned".to_string()))?
            .push(StoredConnection {
                connection: connection.clone(),
                is_deleted: false,
            });
        log::info!(
            "Created {} connection {}",
            request.system_code,
            connection.connection_id
        );
        Ok(self.redact(connection))
    }

    /// Live connections, each with its `systemCode` and without secrets.
    pub fn list(&self) -> Result<Vec<DamConnection>, ApiError> {
        let connections = self
            .connections
            .read()
            .map_err(|_| ApiError::Internal("connection lock poisoned".to_string()))?;
        Ok(connections
            .iter()
            .filter(|c| !c.is_deleted)
            .map(|c| self.redact(c.connection.clone()))
            .collect())
    }

    fn redact(&self, mut connection: DamConnection) -> DamConnection {
        let system = connection.system_code.and_then(|code| self.catalog.get(code));
        if let Some(system) = system {
            for field in system.fields.iter().filter(|f| f.kind == FieldKind::Password) {
                if let Some(value) = connection.configuration.get_mut(&to_pascal_case(&field.key)) {
                    *value = Value::String(REDACTED.to_string());
                }
            }
        }
        connection
    }

    pub fn update_status(
        &self,
        request: &UpdateConnectionStatusRequest,
    ) -> Result<(), ApiError> {
        let mut connections = self
            .connections
            .write()
            .map_err(|_| ApiError::Internal("connection lock poisoned".to_string()))?;
        let stored = connections
            .iter_mut()
            .find(|c| c.connection.connection_id == request.connection_id && !c.is_deleted)
            .ok_or_else(|| StoreError::ConnectionNotFound(request.connection_id.clone()))?;
        stored.is_deleted = request.is_deleted;
        stored.connection.is_active = request.is_active && !request.is_deleted;
        log::info!(
            "Connection {} active={} deleted={}",
            request.connection_id,
            stored.connection.is_active,
            stored.is_deleted
        );
        Ok(())
    }

    /// Hands the images to the connection's provider and returns the ids
    /// that were accepted.
    pub fn deliver(
        &self,
        connection_id: &str,
        images: &[Image],
    ) -> Result<(DamConnection, Vec<String>), ApiError> {
        let connections = self
            .connections
            .read()
            .map_err(|_| ApiError::Internal("connection lock poisoned".to_string()))?;
        let stored = connections
            .iter()
            .find(|c| c.connection.connection_id == connection_id && !c.is_deleted)
            .ok_or_else(|| StoreError::ConnectionNotFound(connection_id.to_string()))?;
        if !stored.connection.is_active {
            return Err(StoreError::ConnectionInactive(connection_id.to_string()).into());
        }
        let uploaded = images
            .iter()
            .map(|img| {
                log::info!(
                    "Delivering {} to {}",
                    img.id,
                    stored.connection.display_name()
                );
                img.id.clone()
            })
            .collect();
        Ok((self.redact(stored.connection.clone()), uploaded))
    }
}

/// Host and optional port of a file-transfer endpoint, given either as a URL
/// (`sftp://host:2222/path`) or as a bare `host[:port][/path]`.
fn tcp_target(endpoint: &str) -> Result<(String, Option<u16>), String> {
    if endpoint.contains("://") {
        let url = Url::parse(endpoint).map_err(|e| format!("Invalid endpoint URL: {}", e))?;
        let host = url
            .host_str()
            .ok_or_else(|| "Endpoint has no host".to_string())?
            .trim_start_matches('[')
            .trim_end_matches(']');
        return Ok((host.to_string(), url.port()));
    }
    let authority = endpoint.split('/').next().unwrap_or(endpoint);
    match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| format!("Invalid port in endpoint: {}", port))?;
            Ok((host.to_string(), Some(port)))
        }
        None => Ok((authority.to_string(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> ConnectionService {
        ConnectionService::new(
            Arc::new(DamCatalog::builtin().unwrap()),
            Duration::from_secs(2),
        )
    }

    fn sftp_request(port: u16) -> CreateDamConnectionRequest {
        serde_json::from_value(json!({
            "SystemCode": "SFTP",
            "Endpoint": "127.0.0.1",
            "Port": port,
            "Username": "deploy",
            "Password": "hunter2"
        }))
        .unwrap()
    }

    fn sftp_url_request(endpoint: &str) -> CreateDamConnectionRequest {
        serde_json::from_value(json!({
            "SystemCode": "SFTP",
            "Endpoint": endpoint,
            "Username": "deploy",
            "Password": "hunter2"
        }))
        .unwrap()
    }

    #[test]
    fn missing_required_fields_fail_validation() {
        let service = service();
        let mut request = sftp_request(22);
        request.fields.remove("Password");
        assert!(matches!(
            service.validate(&request),
            Err(ApiError::BadRequest(msg)) if msg == "Password is required"
        ));
    }

    #[test]
    fn inactive_systems_are_rejected() {
        let request: CreateDamConnectionRequest = serde_json::from_value(json!({
            "SystemCode": "S3",
            "Endpoint": "https://s3.amazonaws.com"
        }))
        .unwrap();
        assert!(matches!(
            service().validate(&request),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn listings_carry_system_code_and_hide_secrets() {
        let service = service();
        let created = service.create(&sftp_request(22)).unwrap();
        assert_eq!(created.system_code, Some(DamSystemCode::Sftp));

        let listed = service.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].endpoint, "127.0.0.1");
        assert_eq!(listed[0].configuration["Password"], json!(REDACTED));
        assert_eq!(listed[0].configuration["Port"], json!(22));
    }

    #[test]
    fn deleted_connections_disappear() {
        let service = service();
        let id = service.create(&sftp_request(22)).unwrap().connection_id;
        let request = UpdateConnectionStatusRequest {
            connection_id: id.clone(),
            is_active: false,
            is_deleted: true,
        };
        service.update_status(&request).unwrap();
        assert!(service.list().unwrap().is_empty());
        assert!(matches!(
            service.update_status(&request),
            Err(ApiError::Store(StoreError::ConnectionNotFound(_)))
        ));
        assert!(service.deliver(&id, &[]).is_err());
    }

    #[test]
    fn inactive_connections_do_not_receive_deliveries() {
        let service = service();
        let id = service.create(&sftp_request(22)).unwrap().connection_id;
        service
            .update_status(&UpdateConnectionStatusRequest {
                connection_id: id.clone(),
                is_active: false,
                is_deleted: false,
            })
            .unwrap();
        assert!(matches!(
            service.deliver(&id, &[]),
            Err(ApiError::Store(StoreError::ConnectionInactive(_)))
        ));
    }

    #[tokio::test]
    async fn tcp_check_reaches_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let response = service().test(&sftp_request(port)).await;
        assert!(response.success, "{}", response.message);
    }

    #[tokio::test]
    async fn tcp_check_reports_refused_port() {
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let response = service().test(&sftp_request(port)).await;
        assert!(!response.success);
    }

    #[tokio::test]
    async fn web_check_rejects_bad_urls() {
        let request: CreateDamConnectionRequest = serde_json::from_value(json!({
            "SystemCode": "BYNDER",
            "Endpoint": "ftp://brand.bynder.com",
            "ApiToken": "t"
        }))
        .unwrap();
        let response = service().test(&request).await;
        assert!(!response.success);
        assert!(response.message.contains("scheme"));
    }

    #[tokio::test]
    async fn tcp_check_uses_port_from_endpoint_url() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let endpoint = format!("sftp://127.0.0.1:{}/uploads/retouched", port);
        let response = service().test(&sftp_url_request(&endpoint)).await;
        assert!(response.success, "{}", response.message);
        assert_eq!(response.message, format!("Reached 127.0.0.1:{}", port));
    }

    #[test]
    fn tcp_targets_split_host_and_port() {
        let target = |e: &str| tcp_target(e).unwrap();
        assert_eq!(target("sftp://files.example.com/"), ("files.example.com".into(), None));
        assert_eq!(
            target("sftp://files.example.com:2222/path"),
            ("files.example.com".into(), Some(2222))
        );
        assert_eq!(target("files.example.com"), ("files.example.com".into(), None));
        assert_eq!(target("files.example.com:2121/in"), ("files.example.com".into(), Some(2121)));
        assert!(tcp_target("files.example.com:ftp").is_err());
    }
}
