use crate::catalog::{characteristics as chr, ServiceType};

pub const SERVICE_ID: &str = "A2";

pub const SERVICE: ServiceType = ServiceType {
    id: SERVICE_ID,
    name: "HAPProtocolInformation",
    required: &[&chr::VERSION],
    optional: &[],
};
