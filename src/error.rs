use aws_sdk_dynamodb::config::http::HttpResponse;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::RequestId;
use std::{fmt, io, path};

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Service error codes that signal throttling rather than a bad request.
const THROTTLING_CODES: [&str; 5] = [
    "ProvisionedThroughputExceededException",
    "RequestLimitExceeded",
    "SlowDown",
    "ThrottlingException",
    "TooManyRequestsException",
];

/// Which side of the wire a service rejection is attributed to.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ErrorCategory {
    /// The request was refused because of the caller (4xx).
    Client,
    /// The service failed to handle a valid request (5xx).
    Service,
    /// No status code was available.
    #[default]
    Unknown,
}

impl ErrorCategory {
    fn from_status(status_code: Option<u16>) -> Self {
        match status_code {
            Some(400..=499) => Self::Client,
            Some(500..=599) => Self::Service,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let category = match self {
            Self::Client => "Client",
            Self::Service => "Service",
            Self::Unknown => "Unknown",
        };
        f.write_str(category)
    }
}

/// A request that reached the remote service and was explicitly refused.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServiceRejection {
    /// Human readable message returned by the service.
    pub message: String,
    /// HTTP status code of the response.
    pub status_code: Option<u16>,
    /// Service specific error code, e.g. `NoSuchKey` or `ResourceNotFoundException`.
    pub error_code: Option<String>,
    /// Client or service fault, derived from the status code.
    pub category: ErrorCategory,
    /// Request identifier assigned by the service.
    pub request_id: Option<String>,
}

impl ServiceRejection {
    /// Whether the same request may succeed if sent again later.
    pub fn is_retryable(&self) -> bool {
        let throttled = self
            .error_code
            .as_deref()
            .is_some_and(|code| THROTTLING_CODES.contains(&code));
        throttled || self.status_code == Some(429) || self.category == ErrorCategory::Service
    }
}

impl fmt::Display for ServiceRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Errors returned by the object fetcher and the paginated readers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The service received the request and refused it.
    #[error("service rejected the request: {0}")]
    Service(ServiceRejection),
    /// The request never completed a round trip, or the response body broke off.
    #[error("transport failure: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },
    /// A local file operation failed.
    #[error("local I/O failure on {}: {source}", path.display())]
    Io {
        /// The file being written.
        path: path::PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// The request was rejected before anything was sent.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Why the request is invalid.
        message: String,
    },
    /// Returned items could not be decoded into the requested type.
    #[error("failed to decode items: {message}")]
    Decode {
        /// Description of the mismatch.
        message: String,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<path::PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Whether retrying the operation after a backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Service(rejection) => rejection.is_retryable(),
            Self::Transport { .. } => true,
            Self::Io { .. } | Self::InvalidRequest { .. } | Self::Decode { .. } => false,
        }
    }

    /// Process exit code for command line front ends.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Service(_) => 2,
            Self::Transport { .. } => 3,
            Self::Io { .. } => 4,
            Self::InvalidRequest { .. } => 5,
            Self::Decode { .. } => 1,
        }
    }

    /// Labelled diagnostic fields, in display order.
    pub fn diagnostics(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Service(rejection) => {
                let or_unknown =
                    |value: Option<String>| value.unwrap_or_else(|| "unknown".to_string());
                vec![
                    ("Error Message", rejection.message.clone()),
                    (
                        "HTTP Status Code",
                        or_unknown(rejection.status_code.map(|code| code.to_string())),
                    ),
                    ("AWS Error Code", or_unknown(rejection.error_code.clone())),
                    ("Error Type", rejection.category.to_string()),
                    ("Request ID", or_unknown(rejection.request_id.clone())),
                ]
            }
            Self::Transport { message } => vec![("Error Message", message.clone())],
            Self::Io { path, source } => vec![
                ("Error Message", source.to_string()),
                ("Path", path.display().to_string()),
            ],
            Self::InvalidRequest { message } | Self::Decode { message } => {
                vec![("Error Message", message.clone())]
            }
        }
    }
}

impl<E> From<SdkError<E, HttpResponse>> for Error
where
    E: ProvideErrorMetadata + RequestId + std::error::Error + Send + Sync + 'static,
{
    fn from(error: SdkError<E, HttpResponse>) -> Self {
        match error {
            SdkError::ServiceError(service_error) => {
                let status_code = Some(service_error.raw().status().as_u16());
                let err = service_error.err();
                let message = err
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string());
                Self::Service(ServiceRejection {
                    message,
                    status_code,
                    error_code: err.code().map(str::to_string),
                    category: ErrorCategory::from_status(status_code),
                    request_id: err.request_id().map(str::to_string),
                })
            }
            other => Self::transport(DisplayErrorContext(&other).to_string()),
        }
    }
}

impl From<serde_dynamo::Error> for Error {
    fn from(error: serde_dynamo::Error) -> Self {
        Self::invalid(error.to_string())
    }
}
