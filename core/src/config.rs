//! Host supplied settings for the accessory server.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DEVICE_ID, DEFAULT_DISPLAY_NAME, DEFAULT_HOST_NAME, DEFAULT_MAX_CONNECTIONS,
    DEFAULT_MODEL_NAME, DEFAULT_TCP_PORT, HAP_PROTOCOL_VERSION, MAX_CONNECTIONS,
};

/// Accessory categories (HAP 13), advertised as `ci`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Other = 1,
    Bridge = 2,
    Fan = 3,
    GarageDoorOpener = 4,
    Lighting = 5,
    Lock = 6,
    Outlet = 7,
    Switch = 8,
    Thermostat = 9,
    Sensor = 10,
    SecuritySystem = 11,
    Door = 12,
    Window = 13,
    WindowCovering = 14,
    ProgrammableSwitch = 15,
    RangeExtender = 16,
    IpCamera = 17,
    VideoDoorbell = 18,
    AirPurifier = 19,
    Heater = 20,
    AirConditioner = 21,
    Humidifier = 22,
    Dehumidifier = 23,
    Sprinkler = 28,
    Faucet = 29,
    ShowerSystem = 30,
    Television = 31,
}

impl Default for Category {
    fn default() -> Self {
        Category::Lighting
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessoryConfig {
    /// Name broadcast over mDNS.
    pub display_name: String,
    pub host_name_base: String,
    /// Broadcast as `md`.
    pub model_name: String,
    pub category: Category,
    /// Pairing identity of the accessory, `XX:XX:XX:XX:XX:XX`.
    pub device_id: String,
    pub tcp_port: u16,
    /// Simultaneous controller sessions. Clamped to [`MAX_CONNECTIONS`].
    pub max_connections: usize,
    /// When set, the first accessory only carries identity services and the
    /// remaining accessories are bridged devices.
    pub bridge: bool,
    pub protocol_version: String,
}

impl Default for AccessoryConfig {
    fn default() -> Self {
        Self {
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            host_name_base: DEFAULT_HOST_NAME.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            category: Category::default(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
            tcp_port: DEFAULT_TCP_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            bridge: false,
            protocol_version: HAP_PROTOCOL_VERSION.to_string(),
        }
    }
}

impl AccessoryConfig {
    pub fn from_json(text: &str) -> crate::Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        Ok(config.normalised())
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self.normalised()
    }

    pub fn with_bridge(mut self, bridge: bool) -> Self {
        self.bridge = bridge;
        self
    }

    /// Number of session slots actually provisioned.
    pub fn sessions(&self) -> usize {
        self.max_connections.clamp(1, MAX_CONNECTIONS)
    }

    fn normalised(mut self) -> Self {
        let sessions = self.sessions();
        if sessions != self.max_connections {
            log::warn!(
                "max_connections {} out of range, using {}",
                self.max_connections,
                sessions
            );
            self.max_connections = sessions;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_partial_json() {
        let config = AccessoryConfig::from_json(
            r#"{"display_name":"Porch","category":"switch","max_connections":4,"bridge":true}"#,
        )
        .unwrap();
        assert_eq!(config.display_name, "Porch");
        assert_eq!(config.category, Category::Switch);
        assert_eq!(config.max_connections, 4);
        assert!(config.bridge);
        assert_eq!(config.model_name, DEFAULT_MODEL_NAME);
    }

    #[test]
    fn clamps_sessions() {
        let config = AccessoryConfig::default().with_max_connections(64);
        assert_eq!(config.max_connections, MAX_CONNECTIONS);
        let config = AccessoryConfig::default().with_max_connections(0);
        assert_eq!(config.max_connections, 1);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(AccessoryConfig::from_json("{").is_err());
    }
}
