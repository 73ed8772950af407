/*! Runtime configuration.

Everything outside this crate's core (the cache store, the HTTP
façade, the filesystem scanner) owns its own configuration; this is
only the handful of options the protocol core itself needs to dial and
authenticate.
*/
use serde::Deserialize;

fn default_client_name() -> String {
    "goaniudp".to_string()
}

fn default_client_version() -> u32 {
    1
}

fn default_address() -> String {
    "api.anidb.net:9000".to_string()
}

/// Configuration for one [`crate::client::Client`].
#[derive(Clone, Debug, Deserialize)]
pub struct AniDbConfig {
    /// AniDB username.
    pub user: String,
    /// AniDB password.
    pub password: String,
    /// Client identifier registered with AniDB (not the user agent).
    #[serde(default = "default_client_name")]
    pub client_name: String,
    /// Client version registered with AniDB.
    #[serde(default = "default_client_version")]
    pub client_version: u32,
    /// `host:port` of the AniDB UDP API server.
    #[serde(default = "default_address")]
    pub address: String,
    /// API key used to derive the ENCRYPT session key. Required only
    /// if the caller invokes `ENCRYPT`.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for AniDbConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            client_name: default_client_name(),
            client_version: default_client_version(),
            address: default_address(),
            api_key: None,
        }
    }
}

impl AniDbConfig {
    /// Parse configuration from a JSON document.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_when_omitted() {
        let cfg = AniDbConfig::from_json(r#"{"user": "u", "password": "p"}"#).unwrap();
        assert_eq!(cfg.client_name, "goaniudp");
        assert_eq!(cfg.client_version, 1);
        assert_eq!(cfg.address, "api.anidb.net:9000");
        assert_eq!(cfg.api_key, None);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let cfg = AniDbConfig::from_json(
            r#"{"user": "u", "password": "p", "client_name": "custom", "client_version": 7, "address": "1.2.3.4:9000", "api_key": "secret"}"#,
        )
        .unwrap();
        assert_eq!(cfg.client_name, "custom");
        assert_eq!(cfg.client_version, 7);
        assert_eq!(cfg.address, "1.2.3.4:9000");
        assert_eq!(cfg.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn missing_required_field_is_an_error() {
        assert!(AniDbConfig::from_json(r#"{"user": "u"}"#).is_err());
    }
}
