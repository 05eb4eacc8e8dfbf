use super::error::{HttpDaoError, HttpResult};

/// Runtime configuration describing how to reach the study backend.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL including the API prefix, e.g. `https://izlek.example/api`.
    pub base_url: String,
    /// Identity token sent on every request through the side-channel header.
    pub identity_token: Option<String>,
}

impl HttpBackendConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            identity_token: None,
        }
    }

    /// Attach the identity token forwarded as `X-Firebase-UID`.
    pub fn with_identity_token(mut self, token: impl Into<String>) -> Self {
        self.identity_token = Some(token.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> HttpResult<Self> {
        let base_url = std::env::var("IZLEK_API_URL").map_err(|_| HttpDaoError::MissingEnvVar {
            var: "IZLEK_API_URL",
        })?;

        let mut config = Self::new(base_url);
        if let Some(token) = std::env::var("IZLEK_IDENTITY_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
        {
            config = config.with_identity_token(token);
        }

        Ok(config)
    }
}
