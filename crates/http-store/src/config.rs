use std::fmt::Debug;

/// Builder for [`HttpStoreConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HttpStoreConfigBuilder {
    base_url: String,
    csrf_token: Option<String>,
    basic_auth: Option<(String, Option<String>)>,
}

impl HttpStoreConfigBuilder {
    /// Creates a builder for the server at the given base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            csrf_token: None,
            basic_auth: None,
        }
    }

    /// Sets the CSRF token sent with every request.
    #[inline]
    pub fn with_csrf_token<S: Into<String>>(mut self, token: S) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// Sets the credentials for HTTP basic authentication.
    #[inline]
    pub fn with_basic_auth<S: Into<String>>(
        mut self,
        username: S,
        password: Option<String>,
    ) -> Self {
        self.basic_auth = Some((username.into(), password));
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> HttpStoreConfig {
        HttpStoreConfig {
            base_url: self.base_url.trim_end_matches('/').to_owned(),
            csrf_token: self.csrf_token,
            basic_auth: self.basic_auth,
        }
    }
}

impl Debug for HttpStoreConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStoreConfigBuilder")
            .field("base_url", &self.base_url)
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "<deducted>"))
            .field(
                "basic_auth",
                &self.basic_auth.as_ref().map(|(user, _)| (user, "<deducted>")),
            )
            .finish()
    }
}

/// Configuration for [`HttpChatStore`](crate::HttpChatStore).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HttpStoreConfig {
    pub(crate) base_url: String,
    pub(crate) csrf_token: Option<String>,
    pub(crate) basic_auth: Option<(String, Option<String>)>,
}

impl HttpStoreConfig {
    /// Returns the base URL, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Debug for HttpStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStoreConfig")
            .field("base_url", &self.base_url)
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "<deducted>"))
            .field(
                "basic_auth",
                &self.basic_auth.as_ref().map(|(user, _)| (user, "<deducted>")),
            )
            .finish()
    }
}
