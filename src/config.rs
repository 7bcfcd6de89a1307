//! Client configuration shared by the object fetcher and the table readers.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use serde::{Deserialize, Serialize};

/// Provider name attached to explicit credentials.
const CREDENTIALS_PROVIDER: &str = "drive-data";

/// Region, credentials and endpoint for the AWS clients.
///
/// Anything left unset falls back to the default provider chain.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ClientConfig {
    /// AWS region
    pub region: Option<String>,

    /// Explicit AWS access key
    pub access_key: Option<String>,

    /// Explicit AWS secret key
    pub secret_key: Option<String>,

    /// Session token for temporary credentials
    pub session_token: Option<String>,

    /// AWS profile name
    pub profile: Option<String>,

    /// Custom endpoint URL (for LocalStack)
    pub endpoint: Option<String>,
}

impl ClientConfig {
    /// Set the AWS region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set explicit credentials.
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Set a session token, used together with explicit credentials.
    pub fn with_session_token(mut self, session_token: impl Into<String>) -> Self {
        self.session_token = Some(session_token.into());
        self
    }

    /// Set the AWS profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Set a custom endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Load the shared SDK configuration.
    pub async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &self.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access_key), Some(secret_key)) = (&self.access_key, &self.secret_key) {
            let credentials = aws_sdk_s3::config::Credentials::new(
                access_key,
                secret_key,
                self.session_token.clone(),
                None,
                CREDENTIALS_PROVIDER,
            );
            loader = loader.credentials_provider(credentials);
        }
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            region = ?self.region,
            endpoint = ?self.endpoint,
            profile = ?self.profile,
            explicit_credentials = self.access_key.is_some() && self.secret_key.is_some(),
            "loading AWS configuration"
        );
        loader.load().await
    }

    /// Build an S3 client. Custom endpoints use path-style addressing.
    pub async fn s3_client(&self) -> aws_sdk_s3::Client {
        let sdk_config = self.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.endpoint.is_some())
            .build();
        aws_sdk_s3::Client::from_conf(s3_config)
    }

    /// Build a DynamoDB client.
    pub async fn dynamodb_client(&self) -> aws_sdk_dynamodb::Client {
        aws_sdk_dynamodb::Client::new(&self.load().await)
    }
}
