use crate::error::Result;
use mongodb::options::{AuthMechanism, ClientOptions, Credential};
use mongodb::sync::Client;
use serde::Deserialize;

/// Connection arguments for one cluster.
///
/// Credentials are optional; when username, password and auth database are
/// all present they are attached through the driver's `Credential` object
/// rather than spliced into the URI, so credential characters like `@` or
/// `:` need no escaping.
#[derive(Deserialize, Debug, Clone)]
pub struct ConnectArgs {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    auth_db: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    27017
}

impl Default for ConnectArgs {
    fn default() -> Self {
        ConnectArgs {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            auth_db: None,
        }
    }
}

impl ConnectArgs {
    pub fn new(host: impl Into<String>, port: u16) -> ConnectArgs {
        ConnectArgs {
            host: host.into(),
            port,
            ..ConnectArgs::default()
        }
    }

    /// set SCRAM-SHA-1 credentials.
    pub fn with_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        auth_db: impl Into<String>,
    ) -> ConnectArgs {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self.auth_db = Some(auth_db.into());
        self
    }

    /// Bare `mongodb://host:port` URI; credentials never appear here.
    pub fn uri(&self) -> String {
        format!("mongodb://{}:{}", self.host, self.port)
    }

    fn credential(&self) -> Option<Credential> {
        match (&self.username, &self.password, &self.auth_db) {
            (Some(user), Some(pass), Some(auth_db)) => Some(
                Credential::builder()
                    .username(user.clone())
                    .password(pass.clone())
                    .source(auth_db.clone())
                    .mechanism(AuthMechanism::ScramSha1)
                    .build(),
            ),
            _ => None,
        }
    }

    pub fn connect(&self) -> Result<Client> {
        let mut options = ClientOptions::parse(self.uri())?;
        options.credential = self.credential();
        Ok(Client::with_options(options)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_is_bare_host_and_port() {
        assert_eq!(
            ConnectArgs::new("localhost", 27017).uri(),
            "mongodb://localhost:27017"
        );
    }

    #[test]
    fn test_uri_never_carries_credentials() {
        let args = ConnectArgs::new("db1", 27018).with_auth("u@ser", "p:a/ss%", "admin");
        assert_eq!(args.uri(), "mongodb://db1:27018");
    }

    #[test]
    fn test_credential_built_from_auth_fields() {
        let args = ConnectArgs::new("db1", 27018).with_auth("u@ser", "p:a/ss%", "admin");
        let credential = args.credential().unwrap();
        assert_eq!(credential.username.as_deref(), Some("u@ser"));
        assert_eq!(credential.password.as_deref(), Some("p:a/ss%"));
        assert_eq!(credential.source.as_deref(), Some("admin"));
        assert_eq!(credential.mechanism, Some(AuthMechanism::ScramSha1));
    }

    #[test]
    fn test_credential_absent_without_full_auth() {
        assert!(ConnectArgs::default().credential().is_none());
        let partial = ConnectArgs {
            username: Some("u".to_string()),
            ..ConnectArgs::default()
        };
        assert!(partial.credential().is_none());
    }
}
