use super::{characteristics as chr, ServiceType};

pub const SERVICE_ID: &str = "43";

pub const SERVICE: ServiceType = ServiceType {
    id: SERVICE_ID,
    name: "LightBulb",
    required: &[&chr::ON],
    optional: &[
        &chr::BRIGHTNESS,
        &chr::HUE,
        &chr::SATURATION,
        &chr::COLOR_TEMPERATURE,
        &chr::NAME,
    ],
};
