use crate::prelude::StringExt;
use serde::Serialize;
use std::convert::AsRef;
use std::{
    error::Error as StdError,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
};
use strum::AsRefStr;
use thiserror::Error as ThisError;

pub trait ErrorMeta {
    fn code(&self) -> ErrorCode;
    fn key(&self) -> ErrorKey;
    fn message(&self) -> ErrorMessage;
}

#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub struct ErrorKey(String);

impl ErrorKey {
    pub fn internal(key: &str, subtype: Option<&str>) -> Self {
        if let Some(subtype) = subtype {
            ErrorKey(format!("err::internal::{}::{}", key, subtype))
        } else {
            ErrorKey(format!("err::internal::{}", key))
        }
    }

    pub fn pipeline(key: &str, subtype: Option<&str>) -> Self {
        if let Some(subtype) = subtype {
            ErrorKey(format!("err::pipeline::{}::{}", key, subtype))
        } else {
            ErrorKey(format!("err::pipeline::{}", key))
        }
    }
}

impl Display for ErrorKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub struct ErrorMessage(String);

impl AsRef<str> for ErrorMessage {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ErrorMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// Failures that abort a whole compilation. No partial output is produced
/// when one of these is returned.
#[derive(ThisError, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, AsRefStr)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "PascalCase")]
pub enum InternalError {
    #[error("An unknown error occurred: {}", .message)]
    UnknownError {
        message: String,
        subtype: Option<String>,
    },
    #[error("A connection error occurred: {}", .message)]
    ConnectionError {
        message: String,
        subtype: Option<String>,
    },
    #[error("Entity not found: {}", .message)]
    KeyNotFound {
        message: String,
        subtype: Option<String>,
    },
    #[error("Argument provided is invalid: {}", .message)]
    InvalidArgument {
        message: String,
        subtype: Option<String>,
    },
    #[error("Configuration error: {}", .message)]
    ConfigurationError {
        message: String,
        subtype: Option<String>,
    },
    #[error("Serialization error: {}", .message)]
    SerializeError {
        message: String,
        subtype: Option<String>,
    },
    #[error("Deserialization error: {}", .message)]
    DeserializeError {
        message: String,
        subtype: Option<String>,
    },
    #[error("Internal consistency violated: {}", .message)]
    ConsistencyViolation {
        message: String,
        subtype: Option<String>,
    },
    #[error("Operation cancelled: {}", .message)]
    Cancelled {
        message: String,
        subtype: Option<String>,
    },
}

impl From<anyhow::Error> for InternalError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast_ref::<InternalError>() {
            Some(internal_error) => internal_error.clone(),
            None => InternalError::UnknownError {
                message: error.to_string(),
                subtype: None,
            },
        }
    }
}

impl InternalError {
    pub fn unknown(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::internal(InternalError::UnknownError {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn connection_error(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::internal(InternalError::ConnectionError {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn key_not_found(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::internal(InternalError::KeyNotFound {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn invalid_argument(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::internal(InternalError::InvalidArgument {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn configuration_error(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::internal(InternalError::ConfigurationError {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn serialize_error(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::internal(InternalError::SerializeError {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn deserialize_error(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::internal(InternalError::DeserializeError {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn consistency_violation(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::internal(InternalError::ConsistencyViolation {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn cancelled(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::internal(InternalError::Cancelled {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }
}

impl ErrorMeta for InternalError {
    fn code(&self) -> ErrorCode {
        match self {
            InternalError::UnknownError { .. } => ErrorCode(1000),
            InternalError::ConnectionError { .. } => ErrorCode(1001),
            InternalError::KeyNotFound { .. } => ErrorCode(1002),
            InternalError::InvalidArgument { .. } => ErrorCode(1003),
            InternalError::ConfigurationError { .. } => ErrorCode(1004),
            InternalError::SerializeError { .. } => ErrorCode(1005),
            InternalError::DeserializeError { .. } => ErrorCode(1006),
            InternalError::ConsistencyViolation { .. } => ErrorCode(1007),
            InternalError::Cancelled { .. } => ErrorCode(1008),
        }
    }

    fn key(&self) -> ErrorKey {
        match self {
            InternalError::UnknownError { subtype, .. } => {
                ErrorKey::internal("unknown", subtype.as_deref())
            }
            InternalError::ConnectionError { subtype, .. } => {
                ErrorKey::internal("connection_error", subtype.as_deref())
            }
            InternalError::KeyNotFound { subtype, .. } => {
                ErrorKey::internal("key_not_found", subtype.as_deref())
            }
            InternalError::InvalidArgument { subtype, .. } => {
                ErrorKey::internal("invalid_argument", subtype.as_deref())
            }
            InternalError::ConfigurationError { subtype, .. } => {
                ErrorKey::internal("configuration_error", subtype.as_deref())
            }
            InternalError::SerializeError { subtype, .. } => {
                ErrorKey::internal("serialize_error", subtype.as_deref())
            }
            InternalError::DeserializeError { subtype, .. } => {
                ErrorKey::internal("deserialize_error", subtype.as_deref())
            }
            InternalError::ConsistencyViolation { subtype, .. } => {
                ErrorKey::internal("consistency_violation", subtype.as_deref())
            }
            InternalError::Cancelled { subtype, .. } => {
                ErrorKey::internal("cancelled", subtype.as_deref())
            }
        }
    }

    fn message(&self) -> ErrorMessage {
        match self {
            InternalError::UnknownError { message, .. }
            | InternalError::ConnectionError { message, .. }
            | InternalError::KeyNotFound { message, .. }
            | InternalError::InvalidArgument { message, .. }
            | InternalError::ConfigurationError { message, .. }
            | InternalError::SerializeError { message, .. }
            | InternalError::DeserializeError { message, .. }
            | InternalError::ConsistencyViolation { message, .. }
            | InternalError::Cancelled { message, .. } => ErrorMessage(message.to_string()),
        }
    }
}

impl Debug for InternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "{}\n", &self)?;
        let mut current = self.source();

        while let Some(cause) = current {
            writeln!(f, "Caused by:\n\t{}", cause)?;
            current = cause.source();
        }

        Ok(())
    }
}

/// Failures scoped to a single pipeline. They exclude that pipeline from the
/// generated document and surface as its status verdict.
#[derive(ThisError, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, AsRefStr)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "PascalCase")]
pub enum PipelineError {
    #[error("Referenced secret missing: {}", .message)]
    ReferencedSecretMissing {
        message: String,
        subtype: Option<String>,
    },
    #[error("Referenced key missing: {}", .message)]
    ReferencedKeyMissing {
        message: String,
        subtype: Option<String>,
    },
    #[error("Env var conflict: {}", .message)]
    EnvVarConflict {
        message: String,
        subtype: Option<String>,
    },
    #[error("TLS configuration invalid: {}", .message)]
    TlsConfigurationInvalid {
        message: String,
        subtype: Option<String>,
    },
    #[error("Endpoint invalid: {}", .message)]
    EndpointInvalid {
        message: String,
        subtype: Option<String>,
    },
    #[error("Maximum pipeline count exceeded: {}", .message)]
    MaxPipelinesExceeded {
        message: String,
        subtype: Option<String>,
    },
    #[error("OTTL specification invalid: {}", .message)]
    OttlSpecInvalid {
        message: String,
        subtype: Option<String>,
    },
}

impl PipelineError {
    pub fn referenced_secret_missing(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::pipeline(PipelineError::ReferencedSecretMissing {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn referenced_key_missing(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::pipeline(PipelineError::ReferencedKeyMissing {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn env_var_conflict(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::pipeline(PipelineError::EnvVarConflict {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn tls_configuration_invalid(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::pipeline(PipelineError::TlsConfigurationInvalid {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn endpoint_invalid(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::pipeline(PipelineError::EndpointInvalid {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn max_pipelines_exceeded(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::pipeline(PipelineError::MaxPipelinesExceeded {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn ottl_spec_invalid(message: &str, subtype: Option<&str>) -> TelemetryError {
        TelemetryError::pipeline(PipelineError::OttlSpecInvalid {
            message: message.to_string(),
            subtype: subtype.map(|s| s.to_string().snake_case()),
        })
    }

    pub fn subtype(&self) -> Option<&str> {
        match self {
            PipelineError::ReferencedSecretMissing { subtype, .. }
            | PipelineError::ReferencedKeyMissing { subtype, .. }
            | PipelineError::EnvVarConflict { subtype, .. }
            | PipelineError::TlsConfigurationInvalid { subtype, .. }
            | PipelineError::EndpointInvalid { subtype, .. }
            | PipelineError::MaxPipelinesExceeded { subtype, .. }
            | PipelineError::OttlSpecInvalid { subtype, .. } => subtype.as_deref(),
        }
    }
}

impl ErrorMeta for PipelineError {
    fn code(&self) -> ErrorCode {
        match self {
            PipelineError::ReferencedSecretMissing { .. } => ErrorCode(2000),
            PipelineError::ReferencedKeyMissing { .. } => ErrorCode(2001),
            PipelineError::EnvVarConflict { .. } => ErrorCode(2002),
            PipelineError::TlsConfigurationInvalid { .. } => ErrorCode(2003),
            PipelineError::EndpointInvalid { .. } => ErrorCode(2004),
            PipelineError::MaxPipelinesExceeded { .. } => ErrorCode(2005),
            PipelineError::OttlSpecInvalid { .. } => ErrorCode(2006),
        }
    }

    fn key(&self) -> ErrorKey {
        match self {
            PipelineError::ReferencedSecretMissing { subtype, .. } => {
                ErrorKey::pipeline("referenced_secret_missing", subtype.as_deref())
            }
            PipelineError::ReferencedKeyMissing { subtype, .. } => {
                ErrorKey::pipeline("referenced_key_missing", subtype.as_deref())
            }
            PipelineError::EnvVarConflict { subtype, .. } => {
                ErrorKey::pipeline("env_var_conflict", subtype.as_deref())
            }
            PipelineError::TlsConfigurationInvalid { subtype, .. } => {
                ErrorKey::pipeline("tls_configuration_invalid", subtype.as_deref())
            }
            PipelineError::EndpointInvalid { subtype, .. } => {
                ErrorKey::pipeline("endpoint_invalid", subtype.as_deref())
            }
            PipelineError::MaxPipelinesExceeded { subtype, .. } => {
                ErrorKey::pipeline("max_pipelines_exceeded", subtype.as_deref())
            }
            PipelineError::OttlSpecInvalid { subtype, .. } => {
                ErrorKey::pipeline("ottl_spec_invalid", subtype.as_deref())
            }
        }
    }

    fn message(&self) -> ErrorMessage {
        match self {
            PipelineError::ReferencedSecretMissing { message, .. }
            | PipelineError::ReferencedKeyMissing { message, .. }
            | PipelineError::EnvVarConflict { message, .. }
            | PipelineError::TlsConfigurationInvalid { message, .. }
            | PipelineError::EndpointInvalid { message, .. }
            | PipelineError::MaxPipelinesExceeded { message, .. }
            | PipelineError::OttlSpecInvalid { message, .. } => ErrorMessage(message.to_string()),
        }
    }
}

impl Debug for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "{}", &self)
    }
}

#[derive(ThisError, Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(untagged)]
pub enum TelemetryError {
    Internal(InternalError),
    Pipeline(PipelineError),
}

impl AsRef<str> for TelemetryError {
    fn as_ref(&self) -> &str {
        match self {
            TelemetryError::Internal(e) => e.as_ref(),
            TelemetryError::Pipeline(e) => e.as_ref(),
        }
    }
}

impl From<anyhow::Error> for TelemetryError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast_ref::<TelemetryError>() {
            Some(telemetry_error) => telemetry_error.clone(),
            None => TelemetryError::Internal(InternalError::UnknownError {
                message: error.to_string(),
                subtype: None,
            }),
        }
    }
}

impl TelemetryError {
    fn internal(internal: InternalError) -> Self {
        TelemetryError::Internal(internal)
    }

    fn pipeline(pipeline: PipelineError) -> Self {
        TelemetryError::Pipeline(pipeline)
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, TelemetryError::Internal(_))
    }

    pub fn is_pipeline(&self) -> bool {
        matches!(self, TelemetryError::Pipeline(_))
    }

    pub fn as_pipeline(&self) -> Option<&PipelineError> {
        match self {
            TelemetryError::Pipeline(e) => Some(e),
            TelemetryError::Internal(_) => None,
        }
    }
}

impl ErrorMeta for TelemetryError {
    fn code(&self) -> ErrorCode {
        match self {
            TelemetryError::Internal(e) => e.code(),
            TelemetryError::Pipeline(e) => e.code(),
        }
    }

    fn key(&self) -> ErrorKey {
        match self {
            TelemetryError::Internal(e) => e.key(),
            TelemetryError::Pipeline(e) => e.key(),
        }
    }

    fn message(&self) -> ErrorMessage {
        match self {
            TelemetryError::Internal(e) => e.message(),
            TelemetryError::Pipeline(e) => e.message(),
        }
    }
}

impl Display for TelemetryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TelemetryError::Internal(e) => write!(f, "{}", e),
            TelemetryError::Pipeline(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_function() {
        let internal_error: TelemetryError = InternalError::unknown("test", None);

        assert_eq!(internal_error.code(), ErrorCode(1000));
        assert_eq!(internal_error.key(), ErrorKey::internal("unknown", None));
        assert_eq!(internal_error.message(), ErrorMessage("test".to_string()));
    }

    #[test]
    fn test_error_key() {
        let key = ErrorKey::pipeline("endpoint_invalid", Some("grpc_path"));
        assert_eq!(key.to_string(), "err::pipeline::endpoint_invalid::grpc_path");
    }

    #[test]
    fn test_subtype_is_snake_cased() {
        let err = PipelineError::endpoint_invalid("bad", Some("GrpcPath"));

        assert_eq!(
            err.key(),
            ErrorKey::pipeline("endpoint_invalid", Some("grpc_path"))
        );
        assert_eq!(err.as_pipeline().and_then(|e| e.subtype()), Some("grpc_path"));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(
            PipelineError::ottl_spec_invalid("x", None).as_ref(),
            "OttlSpecInvalid"
        );
        assert_eq!(
            InternalError::consistency_violation("x", None).as_ref(),
            "ConsistencyViolation"
        );
        assert_eq!(
            PipelineError::env_var_conflict("x", Some("duplicate_header")).key(),
            ErrorKey::pipeline("env_var_conflict", Some("duplicate_header"))
        );
    }

    #[test]
    fn test_round_trip_between_domain_error_and_anyhow_error() {
        let err = InternalError::cancelled("test", None);
        let any_err: anyhow::Error = err.clone().into();
        let round_trip_err: TelemetryError = any_err.into();

        let pipeline_err = PipelineError::referenced_key_missing("test", None);
        let any_pipeline_err: anyhow::Error = pipeline_err.clone().into();
        let round_trip_pipeline_err: TelemetryError = any_pipeline_err.into();

        assert_eq!(err, round_trip_err);
        assert_eq!(pipeline_err, round_trip_pipeline_err);
        assert!(round_trip_err.is_internal());
        assert!(round_trip_pipeline_err.is_pipeline());
    }
}
