use super::{characteristics as chr, ServiceType};

pub const SERVICE_ID: &str = "80";

pub const SERVICE: ServiceType = ServiceType {
    id: SERVICE_ID,
    name: "ContactSensor",
    required: &[&chr::CONTACT_SENSOR_STATE],
    optional: &[
        &chr::STATUS_ACTIVE,
        &chr::STATUS_FAULT,
        &chr::STATUS_TAMPERED,
        &chr::STATUS_LOW_BATTERY,
        &chr::NAME,
    ],
};
