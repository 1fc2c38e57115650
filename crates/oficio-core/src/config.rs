use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{OficioError, Result};

/// Top-level config (`oficio.toml` + the documented env var overrides).
///
/// Every field has a serde default, so an empty environment yields a config
/// that runs with the in-memory KV fallback and no LLM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OficioConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub availability: AvailabilityConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub ops: OpsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedisConfig {
    /// `redis://` URL. Absent → the KV client runs on the in-process map.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host. Absent → live availability is disabled.
    pub host: Option<String>,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_qos")]
    pub qos: u8,
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: f64,
    #[serde(default = "default_request_topic")]
    pub request_topic: String,
    #[serde(default = "default_response_topic")]
    pub response_topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_mqtt_port(),
            username: None,
            password: None,
            qos: default_qos(),
            publish_timeout_secs: default_publish_timeout(),
            request_topic: default_request_topic(),
            response_topic: default_response_topic(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityConfig {
    #[serde(default = "default_availability_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_accept_grace")]
    pub accept_grace_secs: f64,
    #[serde(default = "default_state_ttl")]
    pub state_ttl_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,
}

impl AvailabilityConfig {
    /// Gather timeout with the hard floor applied.
    pub fn effective_timeout_secs(&self) -> u64 {
        self.timeout_secs.max(10)
    }
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_availability_timeout(),
            accept_grace_secs: default_accept_grace(),
            state_ttl_secs: default_state_ttl(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key. Absent → all AI paths degrade to their static fallbacks.
    pub api_key: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: f64,
    #[serde(default = "default_llm_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "bool_true")]
    pub use_ai_expansion: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            max_concurrency: default_llm_concurrency(),
            use_ai_expansion: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    pub supabase_url: Option<String>,
    pub supabase_service_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the provider search backend.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Base URL of the outbound WhatsApp adapter (`POST {url}/send`).
    pub clientes_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "default_flow_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_profile_cache_ttl")]
    pub profile_cache_ttl_secs: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_flow_ttl(),
            profile_cache_ttl_secs: default_profile_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_sampling")]
    pub log_sampling_rate: u64,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_sampling_rate: default_log_sampling(),
        }
    }
}

/// Maps a documented environment variable to its nested config key.
fn env_key(var: &str) -> Option<&'static str> {
    Some(match var {
        "SERVER_HOST" => "gateway.bind",
        "SERVER_PORT" => "gateway.port",
        "REDIS_URL" => "redis.url",
        "MQTT_HOST" => "mqtt.host",
        "MQTT_PORT" => "mqtt.port",
        "MQTT_USUARIO" => "mqtt.username",
        "MQTT_PASSWORD" => "mqtt.password",
        "MQTT_QOS" => "mqtt.qos",
        "MQTT_PUBLISH_TIMEOUT" => "mqtt.publish_timeout_secs",
        "MQTT_TEMA_SOLICITUD" => "mqtt.request_topic",
        "MQTT_TEMA_RESPUESTA" => "mqtt.response_topic",
        "AVAILABILITY_TIMEOUT_SECONDS" => "availability.timeout_secs",
        "AVAILABILITY_ACCEPT_GRACE_SECONDS" => "availability.accept_grace_secs",
        "AVAILABILITY_STATE_TTL_SECONDS" => "availability.state_ttl_secs",
        "AVAILABILITY_POLL_INTERVAL_SECONDS" => "availability.poll_interval_secs",
        "OPENAI_API_KEY" => "llm.api_key",
        "OPENAI_BASE_URL" => "llm.base_url",
        "OPENAI_MODEL" => "llm.model",
        "OPENAI_TIMEOUT_SECONDS" => "llm.timeout_secs",
        "MAX_OPENAI_CONCURRENCY" => "llm.max_concurrency",
        "USE_AI_EXPANSION" => "llm.use_ai_expansion",
        "SUPABASE_URL" => "store.supabase_url",
        "SUPABASE_SERVICE_KEY" => "store.supabase_service_key",
        "SEARCH_BACKEND_URL" => "search.url",
        "WHATSAPP_CLIENTES_URL" => "whatsapp.clientes_url",
        "FLOW_TTL_SECONDS" => "flow.ttl_secs",
        "PROFILE_CACHE_TTL_SECONDS" => "flow.profile_cache_ttl_secs",
        "LOG_LEVEL" => "ops.log_level",
        "LOG_SAMPLING_RATE" => "ops.log_sampling_rate",
        _ => return None,
    })
}

impl OficioConfig {
    /// Load config: TOML file (if present) overridden by environment.
    ///
    /// `path` defaults to `oficio.toml` in the working directory.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let toml_path = path.unwrap_or("oficio.toml");
        let env = Env::raw()
            .filter(|k| env_key(k.as_str()).is_some())
            .map(|k| env_key(k.as_str()).expect("filtered").into())
            .split(".");
        Figment::new()
            .merge(Toml::file(toml_path))
            .merge(env)
            .extract()
            .map_err(|e| OficioError::Config(e.to_string()))
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8010
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_qos() -> u8 {
    1
}
fn default_publish_timeout() -> f64 {
    5.0
}
fn default_request_topic() -> String {
    "av-proveedores/solicitud".to_string()
}
fn default_response_topic() -> String {
    "av-proveedores/respuesta".to_string()
}
fn default_availability_timeout() -> u64 {
    45
}
fn default_accept_grace() -> f64 {
    2.0
}
fn default_state_ttl() -> u64 {
    300
}
fn default_poll_interval() -> f64 {
    1.5
}
fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_timeout() -> f64 {
    5.0
}
fn default_llm_concurrency() -> usize {
    5
}
fn default_flow_ttl() -> u64 {
    3600
}
fn default_profile_cache_ttl() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_sampling() -> u64 {
    10
}
fn bool_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_spec_defaults() {
        let cfg = OficioConfig::default();
        assert_eq!(cfg.availability.timeout_secs, 45);
        assert_eq!(cfg.availability.accept_grace_secs, 2.0);
        assert_eq!(cfg.availability.state_ttl_secs, 300);
        assert_eq!(cfg.availability.poll_interval_secs, 1.5);
        assert_eq!(cfg.flow.ttl_secs, 3600);
        assert_eq!(cfg.flow.profile_cache_ttl_secs, 300);
        assert_eq!(cfg.llm.timeout_secs, 5.0);
        assert_eq!(cfg.llm.max_concurrency, 5);
        assert_eq!(cfg.mqtt.request_topic, "av-proveedores/solicitud");
        assert_eq!(cfg.mqtt.response_topic, "av-proveedores/respuesta");
        assert_eq!(cfg.ops.log_sampling_rate, 10);
    }

    #[test]
    fn availability_timeout_has_floor() {
        let cfg = AvailabilityConfig {
            timeout_secs: 3,
            ..Default::default()
        };
        assert_eq!(cfg.effective_timeout_secs(), 10);
    }

    #[test]
    fn env_keys_cover_spec_variables() {
        for var in [
            "MQTT_HOST",
            "MQTT_PORT",
            "MQTT_USUARIO",
            "MQTT_PASSWORD",
            "MQTT_QOS",
            "MQTT_PUBLISH_TIMEOUT",
            "MQTT_TEMA_SOLICITUD",
            "MQTT_TEMA_RESPUESTA",
            "AVAILABILITY_TIMEOUT_SECONDS",
            "AVAILABILITY_ACCEPT_GRACE_SECONDS",
            "AVAILABILITY_STATE_TTL_SECONDS",
            "AVAILABILITY_POLL_INTERVAL_SECONDS",
            "OPENAI_API_KEY",
            "OPENAI_TIMEOUT_SECONDS",
            "MAX_OPENAI_CONCURRENCY",
            "USE_AI_EXPANSION",
            "SUPABASE_URL",
            "SUPABASE_SERVICE_KEY",
            "REDIS_URL",
            "FLOW_TTL_SECONDS",
            "PROFILE_CACHE_TTL_SECONDS",
            "LOG_LEVEL",
            "LOG_SAMPLING_RATE",
        ] {
            assert!(env_key(var).is_some(), "unmapped env var {var}");
        }
    }
}
