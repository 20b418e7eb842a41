use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

use crate::types::MediaKind;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub media: MediaConfig,
    pub rooms: RoomConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Media transport configuration consumed by the capability gateway on startup.
///
/// These scope the per-room routers and the transports created under them;
/// they are not per-request inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Local IP to bind media transports on
    pub listen_ip: String,
    /// Public address advertised in ICE candidates (None = use listen_ip)
    pub announced_ip: Option<String>,
    /// Low end of the UDP/TCP port range for media transports
    pub rtc_min_port: u16,
    /// High end of the UDP/TCP port range for media transports
    pub rtc_max_port: u16,
    pub enable_udp: bool,
    pub enable_tcp: bool,
    pub prefer_udp: bool,
    /// Static list of permitted media codecs, used to scope each room's router
    pub codecs: Vec<MediaCodec>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            listen_ip: "0.0.0.0".to_string(),
            announced_ip: None,
            rtc_min_port: 10000,
            rtc_max_port: 10100,
            enable_udp: true,
            enable_tcp: true,
            prefer_udp: true,
            codecs: default_codecs(),
        }
    }
}

/// A single permitted codec (kind, MIME type, clock rate, channels, parameters)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaCodec {
    pub kind: MediaKind,
    pub mime_type: String,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    #[serde(default = "empty_parameters")]
    pub parameters: Value,
}

fn empty_parameters() -> Value {
    json!({})
}

/// Default codec set: opus for audio, VP8 for video
#[must_use]
pub fn default_codecs() -> Vec<MediaCodec> {
    vec![
        MediaCodec {
            kind: MediaKind::Audio,
            mime_type: "audio/opus".to_string(),
            clock_rate: 48000,
            channels: Some(2),
            parameters: json!({}),
        },
        MediaCodec {
            kind: MediaKind::Video,
            mime_type: "video/VP8".to_string(),
            clock_rate: 90000,
            channels: None,
            parameters: json!({ "x-google-start-bitrate": 1000 }),
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Maximum number of concurrent rooms (0 = unlimited)
    pub max_rooms: usize,
    /// Maximum participants per room (0 = unlimited)
    pub max_participants_per_room: usize,
    /// Interval between empty-room cleanup sweeps
    pub cleanup_interval_secs: u64,
    /// How long a room must stay idle (no members, no transports) before it
    /// is discarded; keeps rooms alive across brief reconnection gaps
    pub empty_room_grace_secs: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_rooms: 0,
            max_participants_per_room: 0,
            cleanup_interval_secs: 60,
            empty_room_grace_secs: 120,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Override with environment variables (HUDDLE__SERVER__HTTP_PORT,
        // etc.; double underscore separates sections so snake_case keys
        // survive)
        builder = builder.add_source(
            Environment::with_prefix("HUDDLE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// HTTP listen address as host:port
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Validate the configuration, collecting every problem found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if self.media.rtc_min_port > self.media.rtc_max_port {
            errors.push(format!(
                "media.rtc_min_port ({}) must not exceed media.rtc_max_port ({})",
                self.media.rtc_min_port, self.media.rtc_max_port
            ));
        }
        if !self.media.enable_udp && !self.media.enable_tcp {
            errors.push("media: at least one of enable_udp/enable_tcp must be set".to_string());
        }
        if self.media.codecs.is_empty() {
            errors.push("media.codecs must not be empty".to_string());
        }
        for codec in &self.media.codecs {
            if codec.clock_rate == 0 {
                errors.push(format!("media.codecs: {} has zero clock_rate", codec.mime_type));
            }
            if !codec
                .mime_type
                .to_ascii_lowercase()
                .starts_with(codec.kind.as_str())
            {
                errors.push(format!(
                    "media.codecs: {} mime type does not match kind {}",
                    codec.mime_type, codec.kind
                ));
            }
        }
        if self.rooms.cleanup_interval_secs == 0 {
            errors.push("rooms.cleanup_interval_secs must be non-zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Load configuration from config file or environment variables
///
/// Config file search order:
/// 1. HUDDLE_CONFIG_PATH environment variable (explicit path)
/// 2. ./config.yaml (current working directory)
/// 3. /config/config.yaml (container mount path)
/// 4. Fall back to environment variables only
pub fn load_config() -> anyhow::Result<Config> {
    let config_path = std::env::var("HUDDLE_CONFIG_PATH")
        .ok()
        .filter(|p| Path::new(p).exists())
        .or_else(|| {
            let cwd = "config.yaml";
            Path::new(cwd).exists().then(|| cwd.to_string())
        })
        .or_else(|| {
            let mount = "/config/config.yaml";
            Path::new(mount).exists().then(|| mount.to_string())
        });

    let config = if let Some(path) = config_path {
        eprintln!("Loading config from {path}");
        match Config::from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load {path}: {e}");
                eprintln!("Falling back to environment variables");
                Config::from_env().unwrap_or_default()
            }
        }
    } else {
        Config::from_env().unwrap_or_default()
    };

    if let Err(errors) = config.validate() {
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    Ok(config)
}
