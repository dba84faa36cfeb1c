use std::collections::HashMap;

use serde::Deserialize;
use url::Url;

/// Logging and trace export
///
/// Logs always go to stdout. Spans leave the process only when an
/// `[telemetry.otlp]` table is present.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// Extra attributes on the exported resource, e.g. `deployment.environment`
    pub resource_attributes: HashMap<String, String>,
    /// One JSON object per log line instead of the human format
    pub json: bool,
    /// Fraction of root spans kept, clamped to `0.0..=1.0`
    pub sampling_rate: f64,
    pub otlp: Option<OtlpConfig>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "genline".to_owned(),
            resource_attributes: HashMap::new(),
            json: false,
            sampling_rate: 1.0,
            otlp: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtlpConfig {
    pub endpoint: Url,
    #[serde(default)]
    pub transport: OtlpTransport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtlpTransport {
    #[default]
    Grpc,
    HttpProto,
}
