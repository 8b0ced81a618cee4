//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Session limits
    #[serde(default)]
    pub session: SessionLimits,

    /// Inference stage timeouts
    #[serde(default)]
    pub inference: InferenceTimeouts,

    /// Audio configuration
    #[serde(default)]
    pub audio: AudioConfig,

    /// Barge-in configuration
    #[serde(default)]
    pub barge_in: BargeInConfig,

    /// Triage configuration
    #[serde(default)]
    pub triage: TriageConfig,

    /// Routing configuration
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Retention windows per entity kind
    #[serde(default)]
    pub storage: StorageConfig,

    /// Consent requirements
    #[serde(default)]
    pub consent: ConsentConfig,

    /// Webhook security
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Tenant defaults
    #[serde(default)]
    pub tenant: TenantDefaults,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.max_concurrent".to_string(),
                message: "must allow at least one session".to_string(),
            });
        }
        if self.inference.llm_soft_ms > self.inference.llm_hard_ms {
            return Err(ConfigError::InvalidValue {
                field: "inference.llm_soft_ms".to_string(),
                message: "soft timeout must not exceed hard timeout".to_string(),
            });
        }
        if !(10..=30).contains(&self.audio.frame_ms) {
            return Err(ConfigError::InvalidValue {
                field: "audio.frame_ms".to_string(),
                message: "frame duration must be 10-30 ms".to_string(),
            });
        }
        if self.webhook.signature_tolerance_s == 0 {
            return Err(ConfigError::InvalidValue {
                field: "webhook.signature_tolerance_s".to_string(),
                message: "tolerance must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: true,
        }
    }
}

/// Session limits enforced by the supervisor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLimits {
    /// Maximum live sessions; opens beyond this are rejected
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Idle seconds before a phone session is reprompted
    #[serde(default = "default_phone_idle")]
    pub phone_idle_s: u64,

    /// Idle seconds before a chat session is reprompted
    #[serde(default = "default_chat_idle")]
    pub chat_idle_s: u64,

    /// Hard cap on phone session duration
    #[serde(default = "default_phone_max")]
    pub phone_max_s: u64,

    /// Hard cap on chat session duration
    #[serde(default = "default_chat_max")]
    pub chat_max_s: u64,

    /// Hard cap on buffered PCM per session, in seconds of audio
    #[serde(default = "default_buffer_cap")]
    pub audio_buffer_cap_s: u64,
}

fn default_max_concurrent() -> usize {
    100
}
fn default_phone_idle() -> u64 {
    8
}
fn default_chat_idle() -> u64 {
    45
}
fn default_phone_max() -> u64 {
    20 * 60
}
fn default_chat_max() -> u64 {
    2 * 60 * 60
}
fn default_buffer_cap() -> u64 {
    60
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            phone_idle_s: default_phone_idle(),
            chat_idle_s: default_chat_idle(),
            phone_max_s: default_phone_max(),
            chat_max_s: default_chat_max(),
            audio_buffer_cap_s: default_buffer_cap(),
        }
    }
}

/// Timeouts for the AI pipeline stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceTimeouts {
    #[serde(default = "default_stt_ms")]
    pub stt_ms: u64,

    /// Soft timeout: fall back to a template response
    #[serde(default = "default_llm_soft_ms")]
    pub llm_soft_ms: u64,

    /// Hard timeout: treat as stage error
    #[serde(default = "default_llm_hard_ms")]
    pub llm_hard_ms: u64,

    /// Time-to-first-frame budget for synthesis
    #[serde(default = "default_tts_first_frame_ms")]
    pub tts_first_frame_ms: u64,

    /// Reject new sessions when the pool queue exceeds this depth
    #[serde(default = "default_pool_high_water")]
    pub pool_high_water: usize,
}

fn default_stt_ms() -> u64 {
    5_000
}
fn default_llm_soft_ms() -> u64 {
    2_000
}
fn default_llm_hard_ms() -> u64 {
    5_000
}
fn default_tts_first_frame_ms() -> u64 {
    3_000
}
fn default_pool_high_water() -> usize {
    64
}

impl Default for InferenceTimeouts {
    fn default() -> Self {
        Self {
            stt_ms: default_stt_ms(),
            llm_soft_ms: default_llm_soft_ms(),
            llm_hard_ms: default_llm_hard_ms(),
            tts_first_frame_ms: default_tts_first_frame_ms(),
            pool_high_water: default_pool_high_water(),
        }
    }
}

/// Audio framing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Frame duration in milliseconds
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u32,
}

fn default_frame_ms() -> u32 {
    20
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            frame_ms: default_frame_ms(),
        }
    }
}

/// Barge-in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BargeInConfig {
    /// Sustained user voice required to cancel playback
    #[serde(default = "default_barge_in_ms")]
    pub threshold_ms: u32,
}

fn default_barge_in_ms() -> u32 {
    300
}

impl Default for BargeInConfig {
    fn default() -> Self {
        Self {
            threshold_ms: default_barge_in_ms(),
        }
    }
}

/// Triage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Active rule table version
    #[serde(default = "default_rules_version")]
    pub rules_version: u32,

    /// STT confidence floor below which the agent reprompts
    #[serde(default = "default_confidence_floor")]
    pub stt_confidence_floor: f32,
}

fn default_rules_version() -> u32 {
    1
}
fn default_confidence_floor() -> f32 {
    0.5
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            rules_version: default_rules_version(),
            stt_confidence_floor: default_confidence_floor(),
        }
    }
}

/// Routing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Department receiving jobs when no rule matches and no fallback exists
    #[serde(default)]
    pub fallback_department_id: Option<String>,
}

/// Retention windows, days per entity kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_contact_retention")]
    pub contact_retention_days: i64,

    #[serde(default = "default_session_retention")]
    pub session_retention_days: i64,

    #[serde(default = "default_audit_retention")]
    pub audit_retention_days: i64,
}

fn default_contact_retention() -> i64 {
    365 * 3
}
fn default_session_retention() -> i64 {
    90
}
fn default_audit_retention() -> i64 {
    365 * 10
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            contact_retention_days: default_contact_retention(),
            session_retention_days: default_session_retention(),
            audit_retention_days: default_audit_retention(),
        }
    }
}

/// Consent requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentConfig {
    /// Consent kinds that must be granted before recording/processing
    #[serde(default = "default_required_kinds")]
    pub required_kinds: Vec<String>,
}

fn default_required_kinds() -> Vec<String> {
    vec!["data_processing".to_string()]
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            required_kinds: default_required_kinds(),
        }
    }
}

/// Webhook security
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret for provider signatures
    #[serde(default)]
    pub secret: String,

    /// Maximum age of a signed request in seconds
    #[serde(default = "default_tolerance")]
    pub signature_tolerance_s: u64,
}

fn default_tolerance() -> u64 {
    300
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            signature_tolerance_s: default_tolerance(),
        }
    }
}

/// Tenant defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantDefaults {
    /// Default IETF language tag
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Default service radius in kilometers
    #[serde(default = "default_radius")]
    pub service_radius_km: f64,
}

fn default_language() -> String {
    "de-DE".to_string()
}
fn default_radius() -> f64 {
    30.0
}

impl Default for TenantDefaults {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            service_radius_km: default_radius(),
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (CALL_AGENT prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("CALL_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
