use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

use crate::error::DamError;

/// Discriminant of a DAM provider as sent by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum DamSystemCode {
    Sftp,
    Ftp,
    Shopify,
    Bynder,
    Cloudinary,
    S3,
}

impl DamSystemCode {
    pub fn display_name(self) -> &'static str {
        match self {
            DamSystemCode::Sftp => "SFTP",
            DamSystemCode::Ftp => "FTP",
            DamSystemCode::Shopify => "Shopify",
            DamSystemCode::Bynder => "Bynder",
            DamSystemCode::Cloudinary => "Cloudinary",
            DamSystemCode::S3 => "Amazon S3",
        }
    }

    pub fn is_file_transfer(self) -> bool {
        matches!(self, DamSystemCode::Sftp | DamSystemCode::Ftp)
    }

    pub fn default_port(self) -> Option<u16> {
        match self {
            DamSystemCode::Sftp => Some(22),
            DamSystemCode::Ftp => Some(21),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Password,
    Number,
    Url,
}

impl FieldKind {
    pub fn input_type(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Password => "password",
            FieldKind::Number => "number",
            FieldKind::Url => "url",
        }
    }
}

fn default_true() -> bool {
    true
}

/// One input of a provider's connect form. `key` is camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamField {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamSystem {
    pub system_code: DamSystemCode,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub fields: Vec<DamField>,
}

impl DamSystem {
    pub fn field(&self, key: &str) -> Option<&DamField> {
        self.fields.iter().find(|f| f.key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamConnection {
    pub connection_id: String,
    #[serde(default)]
    pub system_code: Option<DamSystemCode>,
    #[serde(default)]
    pub configuration: BTreeMap<String, Value>,
    pub endpoint: String,
    pub is_active: bool,
}

impl DamConnection {
    /// The provider of this connection. Payloads without `systemCode` fall
    /// back to guessing from the configuration shape.
    pub fn resolved_system(&self) -> Option<DamSystemCode> {
        if let Some(code) = self.system_code {
            return Some(code);
        }
        let inferred = infer_system_code(&self.configuration, &self.endpoint);
        log::warn!(
            "Connection {} has no systemCode, inferred {:?}",
            self.connection_id,
            inferred
        );
        inferred
    }

    pub fn system_label(&self) -> &'static str {
        self.resolved_system()
            .map(DamSystemCode::display_name)
            .unwrap_or("Unknown")
    }

    pub fn display_name(&self) -> String {
        if self.endpoint.is_empty() {
            self.system_label().to_string()
        } else {
            format!("{} ({})", self.system_label(), self.endpoint)
        }
    }
}

fn config_port(configuration: &BTreeMap<String, Value>) -> Option<u16> {
    let value = configuration
        .get("Port")
        .or_else(|| configuration.get("port"))?;
    match value {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Legacy heuristics: port 22 is SFTP, port 21 is FTP, a Shopify endpoint is
/// Shopify. Anything else is unknown.
pub fn infer_system_code(
    configuration: &BTreeMap<String, Value>,
    endpoint: &str,
) -> Option<DamSystemCode> {
    match config_port(configuration) {
        Some(22) => return Some(DamSystemCode::Sftp),
        Some(21) => return Some(DamSystemCode::Ftp),
        _ => {}
    }
    if endpoint.to_ascii_lowercase().contains("shopify") {
        return Some(DamSystemCode::Shopify);
    }
    None
}

/// `apiKey` -> `ApiKey`, `access_token` -> `AccessToken`.
pub fn to_pascal_case(key: &str) -> String {
    key.split(|c| c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Body of a create or test request: `SystemCode` plus one PascalCase key per
/// form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDamConnectionRequest {
    #[serde(rename = "SystemCode")]
    pub system_code: DamSystemCode,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl CreateDamConnectionRequest {
    pub fn endpoint(&self) -> Option<&str> {
        self.fields.get("Endpoint").and_then(Value::as_str)
    }

    pub fn port(&self) -> Option<u16> {
        config_port(&self.fields)
    }

    /// Fields other than the endpoint, stored as the connection configuration.
    pub fn configuration(&self) -> BTreeMap<String, Value> {
        self.fields
            .iter()
            .filter(|(k, _)| k.as_str() != "Endpoint")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Values typed into a provider's connect dialog.
///
/// Saving is only allowed after a successful test of exactly the current
/// values; any edit invalidates the previous test.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectionForm {
    values: BTreeMap<String, String>,
    tested: Option<CreateDamConnectionRequest>,
}

impl ConnectionForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
        self.tested = None;
    }

    pub fn to_request(&self, system: &DamSystem) -> Result<CreateDamConnectionRequest, DamError> {
        let mut fields = BTreeMap::new();
        for field in &system.fields {
            let raw = self.value(&field.key).trim();
            if raw.is_empty() {
                if field.required {
                    return Err(DamError::MissingField(field.label.clone()));
                }
                continue;
            }
            let value = match field.kind {
                FieldKind::Number => raw
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| DamError::InvalidNumber {
                        field: field.label.clone(),
                        value: raw.to_string(),
                    })?,
                _ => Value::String(raw.to_string()),
            };
            fields.insert(to_pascal_case(&field.key), value);
        }
        Ok(CreateDamConnectionRequest {
            system_code: system.system_code,
            fields,
        })
    }

    pub fn mark_tested(&mut self, request: CreateDamConnectionRequest) {
        self.tested = Some(request);
    }

    pub fn can_save(&self, system: &DamSystem) -> bool {
        match (&self.tested, self.to_request(system)) {
            (Some(tested), Ok(current)) => *tested == current,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sftp_system() -> DamSystem {
        serde_json::from_value(json!({
            "systemCode": "SFTP",
            "name": "SFTP",
            "fields": [
                {"key": "endpoint", "label": "Host", "kind": "text"},
                {"key": "port", "label": "Port", "kind": "number"},
                {"key": "username", "label": "Username"},
                {"key": "password", "label": "Password", "kind": "password"},
                {"key": "remotePath", "label": "Remote path", "required": false}
            ]
        }))
        .unwrap()
    }

    fn legacy(configuration: Value, endpoint: &str) -> DamConnection {
        DamConnection {
            connection_id: "c1".into(),
            system_code: None,
            configuration: serde_json::from_value(configuration).unwrap(),
            endpoint: endpoint.into(),
            is_active: true,
        }
    }

    #[test]
    fn legacy_port_22_is_sftp_and_21_is_ftp() {
        let host = "files.example.com";
        let sftp = legacy(json!({"Username": "u", "Password": "p", "Port": 22}), host);
        let ftp = legacy(json!({"Username": "u", "Password": "p", "Port": 21}), host);
        assert_eq!(sftp.system_label(), "SFTP");
        assert_eq!(ftp.system_label(), "FTP");
    }

    #[test]
    fn legacy_inference_reads_string_ports_and_shopify_hosts() {
        let sftp = legacy(json!({"Port": "22"}), "");
        let shop = legacy(json!({"AccessToken": "t"}), "my-store.myshopify.com");
        let unknown = legacy(json!({"ApiKey": "k"}), "assets.example.com");
        assert_eq!(sftp.resolved_system(), Some(DamSystemCode::Sftp));
        assert_eq!(shop.resolved_system(), Some(DamSystemCode::Shopify));
        assert_eq!(unknown.system_label(), "Unknown");
    }

    #[test]
    fn explicit_system_code_wins_over_inference() {
        let mut conn = legacy(json!({"Port": 22}), "host");
        conn.system_code = Some(DamSystemCode::Cloudinary);
        assert_eq!(conn.resolved_system(), Some(DamSystemCode::Cloudinary));
        assert_eq!(conn.display_name(), "Cloudinary (host)");
    }

    #[test]
    fn system_code_decodes_uppercase() {
        let conn: DamConnection = serde_json::from_value(json!({
            "connectionId": "c9",
            "systemCode": "SHOPIFY",
            "endpoint": "shop",
            "isActive": true
        }))
        .unwrap();
        assert_eq!(conn.system_code, Some(DamSystemCode::Shopify));
        assert_eq!("sftp".parse::<DamSystemCode>().unwrap(), DamSystemCode::Sftp);
    }

    #[test]
    fn pascal_case_conversion() {
        assert_eq!(to_pascal_case("apiKey"), "ApiKey");
        assert_eq!(to_pascal_case("access_token"), "AccessToken");
        assert_eq!(to_pascal_case("endpoint"), "Endpoint");
    }

    #[test]
    fn form_builds_pascal_case_request() {
        let system = sftp_system();
        let mut form = ConnectionForm::new();
        form.set("endpoint", "files.example.com".into());
        form.set("port", "22".into());
        form.set("username", "alice".into());
        form.set("password", "secret".into());

        let request = form.to_request(&system).unwrap();
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "SystemCode": "SFTP",
                "Endpoint": "files.example.com",
                "Port": 22,
                "Username": "alice",
                "Password": "secret"
            })
        );
        assert_eq!(request.endpoint(), Some("files.example.com"));
        assert_eq!(request.port(), Some(22));
        assert!(!request.configuration().contains_key("Endpoint"));
    }

    #[test]
    fn form_rejects_missing_and_non_numeric_fields() {
        let system = sftp_system();
        let mut form = ConnectionForm::new();
        form.set("endpoint", "host".into());
        assert_eq!(
            form.to_request(&system),
            Err(DamError::MissingField("Port".into()))
        );

        form.set("port", "twenty-two".into());
        form.set("username", "u".into());
        form.set("password", "p".into());
        assert!(matches!(
            form.to_request(&system),
            Err(DamError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn saving_requires_a_test_of_the_current_values() {
        let system = sftp_system();
        let mut form = ConnectionForm::new();
        for (k, v) in [("endpoint", "h"), ("port", "22"), ("username", "u"), ("password", "p")] {
            form.set(k, v.into());
        }
        assert!(!form.can_save(&system));

        form.mark_tested(form.to_request(&system).unwrap());
        assert!(form.can_save(&system));

        form.set("password", "other".into());
        assert!(!form.can_save(&system));
    }
}
