use crate::{
    catalog::{characteristics as chr, ServiceType},
    data_model::{
        accessory::AccessoryBuilder,
        handler::{ServiceContext, ServiceHandler},
        ServiceId,
    },
};

pub const SERVICE_ID: &str = "3E";

pub const SERVICE: ServiceType = ServiceType {
    id: SERVICE_ID,
    name: "AccessoryInformation",
    required: &[
        &chr::IDENTIFY,
        &chr::MANUFACTURER,
        &chr::MODEL,
        &chr::NAME,
        &chr::SERIAL_NUMBER,
        &chr::FIRMWARE_REVISION,
    ],
    optional: &[&chr::HARDWARE_REVISION],
};

/// Identity strings of an accessory.
#[derive(Debug, Clone)]
pub struct AccessoryInformation<'a> {
    pub name: &'a str,
    pub manufacturer: &'a str,
    pub model: &'a str,
    pub serial_number: &'a str,
    pub firmware_revision: &'a str,
    pub hardware_revision: Option<&'a str>,
}

impl<'a> AccessoryInformation<'a> {
    pub const fn new(name: &'a str) -> Self {
        Self {
            name,
            manufacturer: "unknown",
            model: "unknown",
            serial_number: "unknown",
            firmware_revision: "1.0.0",
            hardware_revision: None,
        }
    }

    /// Adds the information service with every required characteristic.
    pub fn declare(&self, accessory: &mut AccessoryBuilder) -> ServiceId {
        let mut service = accessory.add_service(&SERVICE, Identify);
        service.add_characteristic(&chr::IDENTIFY, false);
        service.add_characteristic(&chr::MANUFACTURER, self.manufacturer);
        service.add_characteristic(&chr::MODEL, self.model);
        service.add_characteristic(&chr::NAME, self.name);
        service.add_characteristic(&chr::SERIAL_NUMBER, self.serial_number);
        service.add_characteristic(&chr::FIRMWARE_REVISION, self.firmware_revision);
        if let Some(revision) = self.hardware_revision {
            service.add_characteristic(&chr::HARDWARE_REVISION, revision);
        }
        service.id()
    }
}

/// Accepts identify requests. The routine itself belongs to the host, which
/// observes the write through the log or its own handler.
#[derive(Debug, Default)]
pub struct Identify;

impl ServiceHandler for Identify {
    fn update(&mut self, ctx: &mut ServiceContext) -> bool {
        if ctx.is_updated(&chr::IDENTIFY) {
            log::info!("identify requested for accessory {}", ctx.aid());
        }
        true
    }
}
