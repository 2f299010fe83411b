//! 客户端配置
//!
//! TOML 格式，缺省的键取默认值：
//!
//! ```toml
//! protocol_version = 1
//! command_port = 1337
//! udp_port = 1338
//! response_timeout_ms = 5000
//! ```

use rci_protocol::{COMMAND_PORT, PROTOCOL_VERSION, ProtocolVersion};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// 实时状态通道默认端口
pub const DEFAULT_UDP_PORT: u16 = 1338;

/// 默认响应超时（毫秒）
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 5000;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// 客户端配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 连接时声明的协议版本
    pub protocol_version: ProtocolVersion,
    /// 控制器命令端口
    pub command_port: u16,
    /// 本地接收实时状态的 UDP 端口（连接时告知控制器）
    pub udp_port: u16,
    /// 等待响应的超时（毫秒）
    pub response_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            command_port: COMMAND_PORT,
            udp_port: DEFAULT_UDP_PORT,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
        }
    }
}

impl ClientConfig {
    /// 从 TOML 字符串解析
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), ?config, "client config loaded");
        Ok(config)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.protocol_version, 1);
        assert_eq!(config.command_port, 1337);
        assert_eq!(config.udp_port, 1338);
        assert_eq!(config.response_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ClientConfig::from_toml_str("udp_port = 4000\n").unwrap();
        assert_eq!(config.udp_port, 4000);
        assert_eq!(config.command_port, COMMAND_PORT);
        assert_eq!(config.protocol_version, PROTOCOL_VERSION);
    }

    #[test]
    fn test_invalid_toml() {
        let err = ClientConfig::from_toml_str("udp_port = \"not a port\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "protocol_version = 2\nresponse_timeout_ms = 250").unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.protocol_version, 2);
        assert_eq!(config.response_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ClientConfig::load("/nonexistent/rci.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/rci.toml"));
    }

    #[test]
    fn test_serialize_round_trip() {
        let config = ClientConfig {
            udp_port: 5000,
            ..ClientConfig::default()
        };
        let text = toml::to_string(&config).unwrap();
        assert_eq!(ClientConfig::from_toml_str(&text).unwrap(), config);
    }
}
