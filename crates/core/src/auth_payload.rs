//! Credential payload normalization.
//!
//! Login clients in the wild send credentials in several shapes: flat
//! `{email, password}`, nested under `auth` as an object, nested under `auth`
//! as a JSON-encoded string, or with legacy field names (`login`, `usuario`,
//! `senha`, `pass`). [`AuthPayload`] names each accepted shape and
//! [`AuthPayload::normalize`] funnels all of them into one
//! [`NormalizedCredentials`] value.
//!
//! Nothing in this module fails: malformed input degrades to empty strings and
//! the caller decides what "missing credentials" means.

use std::borrow::Cow;

use serde_json::{Map, Value};

/// Keys that mark an object as a credentials object.
///
/// A nested `auth` value is only preferred over the flat body when it contains
/// at least one of these.
pub const AUTH_PAYLOAD_FIELDS: &[&str] = &[
    "email",
    "login",
    "usuario",
    "password",
    "senha",
    "pass",
    "name",
    "cnpj_access",
    "invite_token",
];

/// Email keys in lookup priority order.
const EMAIL_KEYS: &[&str] = &["email", "login", "usuario"];

/// Password keys in lookup priority order.
const PASSWORD_KEYS: &[&str] = &["password", "senha", "pass"];

/// Legacy keys reported back through [`NormalizedCredentials::deprecated_keys`].
const DEPRECATED_KEYS: &[&str] = &["login", "usuario", "senha", "pass"];

/// The request shapes the login endpoint accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthPayload {
    /// `{"auth": {...}}` where the inner object carries credential fields.
    Nested(Map<String, Value>),
    /// `{"auth": "{...}"}` where the string decodes to a credentials object.
    NestedEncoded(Map<String, Value>),
    /// Credentials at the top level of the body.
    Flat(Map<String, Value>),
    /// The body is not an object (absent, unparseable, array, scalar).
    Empty,
}

/// Canonical credentials extracted from any [`AuthPayload`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedCredentials {
    /// Trimmed, lower-cased email. Empty when absent.
    pub email: String,
    /// Password exactly as sent (never trimmed). Empty when absent.
    pub password: String,
    /// Legacy keys present in the payload, for observability only.
    pub deprecated_keys: Vec<&'static str>,
}

impl NormalizedCredentials {
    /// Whether both email and password are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }
}

impl AuthPayload {
    /// Classify a parsed request body.
    ///
    /// A body that is itself a JSON string is decoded once more before
    /// classification. `auth` wins only when it is (or decodes to) an object
    /// containing at least one of [`AUTH_PAYLOAD_FIELDS`]; otherwise the flat
    /// body is used.
    pub fn from_body(body: &Value) -> Self {
        let body = decode_string_body(body);

        match body.get("auth") {
            Some(Value::Object(map)) if looks_like_credentials(map) => {
                return Self::Nested(map.clone());
            }
            Some(Value::String(text)) => {
                if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
                    if looks_like_credentials(&map) {
                        return Self::NestedEncoded(map);
                    }
                }
            }
            _ => {}
        }

        match &*body {
            Value::Object(map) => Self::Flat(map.clone()),
            _ => Self::Empty,
        }
    }

    /// The field map backing this payload, if any.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Nested(map) | Self::NestedEncoded(map) | Self::Flat(map) => Some(map),
            Self::Empty => None,
        }
    }

    /// Short label for logs.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Nested(_) => "nested",
            Self::NestedEncoded(_) => "nested_encoded",
            Self::Flat(_) => "flat",
            Self::Empty => "empty",
        }
    }

    /// Extract the canonical `{email, password}` pair.
    pub fn normalize(&self) -> NormalizedCredentials {
        let Some(fields) = self.fields() else {
            return NormalizedCredentials::default();
        };

        let email = first_scalar(fields, EMAIL_KEYS).trim().to_lowercase();
        let password = first_scalar(fields, PASSWORD_KEYS);
        let deprecated_keys = DEPRECATED_KEYS
            .iter()
            .copied()
            .filter(|key| fields.contains_key(*key))
            .collect();

        NormalizedCredentials {
            email,
            password,
            deprecated_keys,
        }
    }
}

/// Fields accepted by the registration endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationPayload {
    /// Trimmed display name.
    pub name: String,
    /// Trimmed, lower-cased email.
    pub email: String,
    /// Raw registration number; callers normalize it to an access tag.
    pub cnpj_access: String,
    pub password: String,
    pub invite_token: Option<String>,
}

impl RegistrationPayload {
    /// Read registration fields from `body.auth` when it is an object, else
    /// from the body itself.
    pub fn from_body(body: &Value) -> Self {
        let body = decode_string_body(body);
        let fields = match body.get("auth") {
            Some(Value::Object(map)) => Some(map),
            _ => body.as_object(),
        };
        let Some(fields) = fields else {
            return Self::default();
        };

        let invite_token = first_scalar(fields, &["invite_token"]);

        Self {
            name: first_scalar(fields, &["name"]).trim().to_string(),
            email: first_scalar(fields, &["email"]).trim().to_lowercase(),
            cnpj_access: first_scalar(fields, &["cnpj_access"]),
            password: first_scalar(fields, &["password"]),
            invite_token: (!invite_token.is_empty()).then_some(invite_token),
        }
    }

    /// Whether every required field is non-empty.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty()
            && !self.email.is_empty()
            && !self.cnpj_access.is_empty()
            && !self.password.is_empty()
    }
}

/// Media type of HTML form posts.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Parse a raw request body by its `Content-Type`.
///
/// Form-encoded bodies become an object of string fields. Anything else,
/// including a missing or wrong content type, is read as JSON.
pub fn parse_body(content_type: Option<&str>, bytes: &[u8]) -> Value {
    if content_type.is_some_and(is_form_content_type) {
        parse_form_body(bytes)
    } else {
        parse_request_body(bytes)
    }
}

/// Parse a form-encoded body. Empty or undecodable input yields [`Value::Null`].
///
/// A repeated field keeps its last value.
pub fn parse_form_body(bytes: &[u8]) -> Value {
    let Ok(pairs) = serde_urlencoded::from_bytes::<Vec<(String, String)>>(bytes) else {
        return Value::Null;
    };
    let fields: Map<String, Value> = pairs
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    if fields.is_empty() {
        Value::Null
    } else {
        Value::Object(fields)
    }
}

fn is_form_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

/// Parse a raw request body. Empty or invalid JSON yields [`Value::Null`].
pub fn parse_request_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or(Value::Null)
}

/// Whether a parsed body carries nothing: null, a blank string, or an empty
/// object/array.
pub fn is_body_empty(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn looks_like_credentials(map: &Map<String, Value>) -> bool {
    map.keys().any(|key| AUTH_PAYLOAD_FIELDS.contains(&key.as_str()))
}

/// Decode a body that arrived as a JSON string holding JSON.
fn decode_string_body(body: &Value) -> Cow<'_, Value> {
    match body {
        Value::String(text) => Cow::Owned(serde_json::from_str(text).unwrap_or(Value::Null)),
        other => Cow::Borrowed(other),
    }
}

/// First key in `keys` holding a non-null value, coerced to a string.
fn first_scalar(fields: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| fields.get(*key).and_then(coerce_scalar))
        .unwrap_or_default()
}

/// Null counts as absent. Objects and arrays are present but unusable.
fn coerce_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Array(_) | Value::Object(_) => Some(String::new()),
    }
}
