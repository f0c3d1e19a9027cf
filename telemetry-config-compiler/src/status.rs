use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition as KubeCondition, Time};
use serde::Serialize;
use strum::{AsRefStr, Display};
use crate::validation::ExpiryNotice;
use telemetry_domain::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, AsRefStr, Display)]
pub enum ConditionType {
    ConfigurationGenerated,
    FlowHealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, AsRefStr, Display)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, AsRefStr, Display)]
pub enum Reason {
    GatewayConfigured,
    #[strum(serialize = "TLSCertificateAboutToExpire")]
    #[serde(rename = "TLSCertificateAboutToExpire")]
    TlsCertificateAboutToExpire,
    ReferencedSecretMissing,
    #[strum(serialize = "TLSConfigurationInvalid")]
    #[serde(rename = "TLSConfigurationInvalid")]
    TlsConfigurationInvalid,
    EndpointInvalid,
    MaxPipelinesExceeded,
    #[strum(serialize = "OTTLSpecInvalid")]
    #[serde(rename = "OTTLSpecInvalid")]
    OttlSpecInvalid,
    EnvVarConflict,
    SelfMonConfigNotGenerated,
}

impl From<&PipelineError> for Reason {
    fn from(error: &PipelineError) -> Self {
        match error {
            PipelineError::ReferencedSecretMissing { .. }
            | PipelineError::ReferencedKeyMissing { .. } => Reason::ReferencedSecretMissing,
            PipelineError::TlsConfigurationInvalid { .. } => Reason::TlsConfigurationInvalid,
            PipelineError::EndpointInvalid { .. } => Reason::EndpointInvalid,
            PipelineError::MaxPipelinesExceeded { .. } => Reason::MaxPipelinesExceeded,
            PipelineError::OttlSpecInvalid { .. } => Reason::OttlSpecInvalid,
            PipelineError::EnvVarConflict { .. } => Reason::EnvVarConflict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: Reason,
    pub message: String,
}

impl Condition {
    /// Kubernetes form of the condition, stamped by the caller.
    pub fn to_kube(&self, observed_generation: Option<i64>, now: Time) -> KubeCondition {
        KubeCondition {
            type_: self.condition_type.to_string(),
            status: self.status.to_string(),
            reason: self.reason.to_string(),
            message: self.message.clone(),
            observed_generation,
            last_transition_time: now,
        }
    }
}

/// Outcome of one compilation for one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineVerdict {
    pub configuration_generated: Condition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_healthy: Option<Condition>,
}

impl PipelineVerdict {
    pub fn generated() -> Self {
        Self {
            configuration_generated: Condition {
                condition_type: ConditionType::ConfigurationGenerated,
                status: ConditionStatus::True,
                reason: Reason::GatewayConfigured,
                message: "Collector configuration generated".to_owned(),
            },
            flow_healthy: None,
        }
    }

    /// Generated, but the TLS material expires soon.
    pub fn generated_with_notice(notice: &ExpiryNotice) -> Self {
        Self {
            configuration_generated: Condition {
                condition_type: ConditionType::ConfigurationGenerated,
                status: ConditionStatus::True,
                reason: Reason::TlsCertificateAboutToExpire,
                message: notice.message(),
            },
            flow_healthy: None,
        }
    }

    pub fn failed(error: &PipelineError) -> Self {
        Self {
            configuration_generated: Condition {
                condition_type: ConditionType::ConfigurationGenerated,
                status: ConditionStatus::False,
                reason: Reason::from(error),
                message: error.to_string(),
            },
            flow_healthy: Some(Condition {
                condition_type: ConditionType::FlowHealthy,
                status: ConditionStatus::False,
                reason: Reason::SelfMonConfigNotGenerated,
                message: "No data flows because the pipeline is not part of the collector configuration"
                    .to_owned(),
            }),
        }
    }

    pub fn is_generated(&self) -> bool {
        self.configuration_generated.status == ConditionStatus::True
    }

    pub fn reason(&self) -> Reason {
        self.configuration_generated.reason
    }

    pub fn conditions(&self) -> Vec<&Condition> {
        std::iter::once(&self.configuration_generated)
            .chain(self.flow_healthy.as_ref())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_names() {
        assert_eq!(Reason::TlsConfigurationInvalid.to_string(), "TLSConfigurationInvalid");
        assert_eq!(Reason::OttlSpecInvalid.as_ref(), "OTTLSpecInvalid");
        assert_eq!(Reason::GatewayConfigured.to_string(), "GatewayConfigured");
        assert_eq!(
            Reason::TlsCertificateAboutToExpire.to_string(),
            "TLSCertificateAboutToExpire"
        );
    }

    #[test]
    fn test_env_var_conflict_reason() {
        let err = PipelineError::env_var_conflict("clash", Some("duplicate_header"));
        let verdict = PipelineVerdict::failed(err.as_pipeline().expect("pipeline error"));

        assert_eq!(verdict.reason(), Reason::EnvVarConflict);
        assert!(!verdict.is_generated());
    }

    #[test]
    fn test_expiry_notice_keeps_pipeline_generated() {
        let verdict = PipelineVerdict::generated_with_notice(&ExpiryNotice {
            is_ca: true,
            not_after: "Jan  1 00:00:00 2124 +00:00".to_owned(),
        });

        assert!(verdict.is_generated());
        assert_eq!(verdict.reason(), Reason::TlsCertificateAboutToExpire);
        assert!(verdict
            .configuration_generated
            .message
            .starts_with("TLS CA certificate is about to expire"));
    }

    #[test]
    fn test_key_missing_reports_secret_missing() {
        let err = PipelineError::referenced_key_missing("no key", None);
        let verdict = PipelineVerdict::failed(err.as_pipeline().expect("pipeline error"));

        assert!(!verdict.is_generated());
        assert_eq!(verdict.reason(), Reason::ReferencedSecretMissing);
        assert_eq!(
            verdict.flow_healthy.as_ref().map(|c| c.reason),
            Some(Reason::SelfMonConfigNotGenerated)
        );
        assert_eq!(verdict.conditions().len(), 2);
    }

    #[test]
    fn test_generated_verdict_to_kube() {
        let verdict = PipelineVerdict::generated();
        let condition = verdict
            .configuration_generated
            .to_kube(Some(3), Time(Default::default()));

        assert_eq!(condition.type_, "ConfigurationGenerated");
        assert_eq!(condition.status, "True");
        assert_eq!(condition.reason, "GatewayConfigured");
        assert_eq!(condition.observed_generation, Some(3));
        assert_eq!(verdict.conditions().len(), 1);
    }
}
