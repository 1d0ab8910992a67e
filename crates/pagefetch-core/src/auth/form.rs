use super::{Login, LoginError};
use crate::cancel::CancelToken;
use crate::client::{HttpClient, ReadMode, Request};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::form_urlencoded;
use url::Url;

/// Form login: one urlencoded POST to `protocol://host:port/login_path`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormCredential {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub login_path: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_username_field")]
    pub username_field: String,
    #[serde(default = "default_password_field")]
    pub password_field: String,
}

fn default_username_field() -> String {
    "username".to_string()
}

fn default_password_field() -> String {
    "password".to_string()
}

impl fmt::Debug for FormCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormCredential")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("login_path", &self.login_path)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("username_field", &self.username_field)
            .field("password_field", &self.password_field)
            .finish()
    }
}

impl FormCredential {
    pub fn login_url(&self) -> Result<Url, url::ParseError> {
        let slash = if self.login_path.starts_with('/') { "" } else { "/" };
        Url::parse(&format!(
            "{}://{}:{}{}{}",
            self.protocol, self.host, self.port, slash, self.login_path
        ))
    }

    pub fn form_body(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair(&self.username_field, &self.username)
            .append_pair(&self.password_field, &self.password)
            .finish()
    }
}

impl Login for FormCredential {
    fn apply(&self, client: &HttpClient, cancel: &CancelToken) -> Result<(), LoginError> {
        let url = self.login_url()?;
        let request = Request::post_form(&url, self.form_body());
        let exchange = client.execute(&request, ReadMode::Discard, cancel)?;
        let status = exchange.head.status;
        exchange.finish();
        if (200..400).contains(&status) {
            Ok(())
        } else {
            Err(LoginError::Rejected { status })
        }
    }
}
