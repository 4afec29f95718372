use super::{characteristics as chr, ServiceType};

pub const SERVICE_ID: &str = "49";

pub const SERVICE: ServiceType = ServiceType {
    id: SERVICE_ID,
    name: "Switch",
    required: &[&chr::ON],
    optional: &[&chr::NAME],
};
