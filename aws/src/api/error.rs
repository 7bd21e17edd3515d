use thiserror::Error;

/// SNS error codes meaning the platform application does not exist
const NOT_FOUND_CODES: [&str; 2] = ["NotFound", "NoSNSApplication"];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{operation} failed ({code}): {message}")]
    Remote {
        operation: &'static str,
        code: String,
        message: String,
    },

    #[error("platform application {arn} not found")]
    NotFound { arn: String },

    #[error("invalid platform application ARN \"{0}\"")]
    InvalidArn(String),

    #[error("failed to configure AWS client: {0}")]
    Config(String),
}

impl ApiError {
    /// Build from a service error code, folding the not-found codes into
    /// `NotFound`
    pub fn from_code(operation: &'static str, arn: Option<&str>, code: &str, message: &str) -> Self {
        match arn {
            Some(arn) if NOT_FOUND_CODES.contains(&code) => ApiError::NotFound {
                arn: arn.to_string(),
            },
            _ => ApiError::Remote {
                operation,
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            ApiError::NotFound { .. } => true,
            ApiError::Remote { code, .. } => NOT_FOUND_CODES.contains(&code.as_str()),
            _ => false,
        }
    }
}
