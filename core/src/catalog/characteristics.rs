//! Characteristic types used by the bundled services.

use super::{CharacteristicType, Initial};
use crate::data_model::{Format, Permissions};

const PR: Permissions = Permissions::PAIRED_READ;
const PW: Permissions = Permissions::PAIRED_WRITE;
const PR_EV: Permissions = Permissions::PAIRED_READ.union(Permissions::EVENTS);
const PR_PW_EV: Permissions = PR_EV.union(Permissions::PAIRED_WRITE);

// Accessory Information
pub const IDENTIFY: CharacteristicType =
    CharacteristicType::new("14", "Identify", Format::Bool, PW, Initial::Number(0.0));
pub const MANUFACTURER: CharacteristicType = CharacteristicType::new(
    "20",
    "Manufacturer",
    Format::String,
    PR,
    Initial::Text("unknown"),
);
pub const MODEL: CharacteristicType =
    CharacteristicType::new("21", "Model", Format::String, PR, Initial::Text("unknown"));
pub const NAME: CharacteristicType =
    CharacteristicType::new("23", "Name", Format::String, PR, Initial::Text("unnamed"));
pub const SERIAL_NUMBER: CharacteristicType = CharacteristicType::new(
    "30",
    "SerialNumber",
    Format::String,
    PR,
    Initial::Text("unknown"),
);
pub const FIRMWARE_REVISION: CharacteristicType = CharacteristicType::new(
    "52",
    "FirmwareRevision",
    Format::String,
    PR,
    Initial::Text("1.0.0"),
);
pub const HARDWARE_REVISION: CharacteristicType = CharacteristicType::new(
    "53",
    "HardwareRevision",
    Format::String,
    PR,
    Initial::Text("1.0.0"),
);

// Protocol Information
pub const VERSION: CharacteristicType =
    CharacteristicType::new("37", "Version", Format::String, PR, Initial::Text("1.1.0"));

// Lighting
pub const ON: CharacteristicType =
    CharacteristicType::new("25", "On", Format::Bool, PR_PW_EV, Initial::Number(0.0));
pub const BRIGHTNESS: CharacteristicType =
    CharacteristicType::new("8", "Brightness", Format::Int, PR_PW_EV, Initial::Number(0.0))
        .range(0.0, 100.0, 1.0);
pub const HUE: CharacteristicType =
    CharacteristicType::new("13", "Hue", Format::Float, PR_PW_EV, Initial::Number(0.0))
        .range(0.0, 360.0, 1.0);
pub const SATURATION: CharacteristicType = CharacteristicType::new(
    "2F",
    "Saturation",
    Format::Float,
    PR_PW_EV,
    Initial::Number(0.0),
)
.range(0.0, 100.0, 1.0);
pub const COLOR_TEMPERATURE: CharacteristicType = CharacteristicType::new(
    "CE",
    "ColorTemperature",
    Format::U32,
    PR_PW_EV,
    Initial::Number(200.0),
)
.range(140.0, 500.0, 1.0);

// Sensors
pub const CONTACT_SENSOR_STATE: CharacteristicType = CharacteristicType::new(
    "6A",
    "ContactSensorState",
    Format::U8,
    PR_EV,
    Initial::Number(0.0),
)
.range(0.0, 1.0, 1.0)
.static_range();
pub const CURRENT_TEMPERATURE: CharacteristicType = CharacteristicType::new(
    "11",
    "CurrentTemperature",
    Format::Float,
    PR_EV,
    Initial::Number(0.0),
)
.range(0.0, 100.0, 0.1);
pub const STATUS_ACTIVE: CharacteristicType =
    CharacteristicType::new("75", "StatusActive", Format::Bool, PR_EV, Initial::Number(1.0));
pub const STATUS_FAULT: CharacteristicType =
    CharacteristicType::new("77", "StatusFault", Format::U8, PR_EV, Initial::Number(0.0))
        .range(0.0, 1.0, 1.0)
        .static_range();
pub const STATUS_LOW_BATTERY: CharacteristicType = CharacteristicType::new(
    "79",
    "StatusLowBattery",
    Format::U8,
    PR_EV,
    Initial::Number(0.0),
)
.range(0.0, 1.0, 1.0)
.static_range();
pub const STATUS_TAMPERED: CharacteristicType = CharacteristicType::new(
    "7A",
    "StatusTampered",
    Format::U8,
    PR_EV,
    Initial::Number(0.0),
)
.range(0.0, 1.0, 1.0)
.static_range();

// Buttons
pub const PROGRAMMABLE_SWITCH_EVENT: CharacteristicType = CharacteristicType::new(
    "73",
    "ProgrammableSwitchEvent",
    Format::U8,
    PR_EV,
    Initial::Number(0.0),
)
.range(0.0, 2.0, 1.0)
.static_range();
pub const SERVICE_LABEL_INDEX: CharacteristicType = CharacteristicType::new(
    "CB",
    "ServiceLabelIndex",
    Format::U8,
    PR,
    Initial::Number(1.0),
)
.range(1.0, 255.0, 1.0);
