use crate::{InternalError, TelemetryError};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Metrics,
    Traces,
    Logs,
}

impl TryFrom<&str> for Signal {
    type Error = TelemetryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "metrics" | "metric" => Ok(Signal::Metrics),
            "traces" | "trace" => Ok(Signal::Traces),
            "logs" | "log" => Ok(Signal::Logs),
            _ => Err(InternalError::invalid_argument(
                &format!("Invalid signal: {}", value),
                None,
            )),
        }
    }
}

impl FromStr for Signal {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl Display for Signal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let signal = match self {
            Signal::Metrics => "metrics",
            Signal::Traces => "traces",
            Signal::Logs => "logs",
        };
        write!(f, "{signal}")
    }
}
