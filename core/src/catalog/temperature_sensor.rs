use super::{characteristics as chr, ServiceType};

pub const SERVICE_ID: &str = "8A";

pub const SERVICE: ServiceType = ServiceType {
    id: SERVICE_ID,
    name: "TemperatureSensor",
    required: &[&chr::CURRENT_TEMPERATURE],
    optional: &[
        &chr::STATUS_ACTIVE,
        &chr::STATUS_FAULT,
        &chr::STATUS_TAMPERED,
        &chr::STATUS_LOW_BATTERY,
        &chr::NAME,
    ],
};
