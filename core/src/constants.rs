//! All the constants used by the accessory server.
//! Some limits are fixed at compile time because per-session state is held
//! in fixed-capacity containers.

/// Upper bound on simultaneous controller sessions. The configured maximum
/// may be lower but never higher.
pub const MAX_CONNECTIONS: usize = 16;
/// HAP requires accessories to support at least 8 simultaneous sessions.
pub const DEFAULT_MAX_CONNECTIONS: usize = 8;
/// A bridge may expose at most 150 accessories, including itself.
pub const MAX_ACCESSORIES: usize = 150;

pub const DEFAULT_TCP_PORT: u16 = 80;
pub const DEFAULT_DISPLAY_NAME: &str = "Accessory Server";
pub const DEFAULT_HOST_NAME: &str = "hap-accessory";
pub const DEFAULT_MODEL_NAME: &str = "HAP-Accessory";
pub const DEFAULT_DEVICE_ID: &str = "00:00:00:00:00:00";
pub const HAP_PROTOCOL_VERSION: &str = "1.1.0";

/// Persistence keys are `TTTTAAAAAAAAIII`: type, accessory id, instance id.
pub const PERSIST_KEY_LEN: usize = 15;
/// Only the low 12 bits of an instance id take part in the persistence key.
pub const PERSIST_IID_MASK: u32 = 0xFFF;
/// Key under which the configuration signature is stored.
pub const CONFIG_RECORD_KEY: &str = "HAPHASH";
/// The advertised configuration number wraps back to 1 past this value.
pub const MAX_CONFIG_NUMBER: u32 = 65535;

/// SHA-384
pub const CONFIG_DIGEST_LEN: usize = 48;

/// Upper bound on button presses dispatched in one polling cycle.
pub const MAX_PRESSES_PER_CYCLE: usize = 16;
