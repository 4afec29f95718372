//! Stateless programmable switch: a button that reports single, double and
//! long presses as events and holds no state of its own.

use super::{characteristics as chr, ServiceType};
use crate::data_model::handler::{PressType, ServiceContext, ServiceHandler};

pub const SERVICE_ID: &str = "89";

pub const SERVICE: ServiceType = ServiceType {
    id: SERVICE_ID,
    name: "StatelessProgrammableSwitch",
    required: &[&chr::PROGRAMMABLE_SWITCH_EVENT],
    optional: &[&chr::SERVICE_LABEL_INDEX, &chr::NAME],
};

/// Publishes every press on the service's button as a
/// `ProgrammableSwitchEvent` notification.
#[derive(Debug, Default)]
pub struct ProgrammableSwitch;

impl ServiceHandler for ProgrammableSwitch {
    fn button(&mut self, ctx: &mut ServiceContext, pin: u8, press: PressType) {
        log::debug!("button on pin {pin}: {press:?}");
        if let Err(e) = ctx.set_value(&chr::PROGRAMMABLE_SWITCH_EVENT, press as u8) {
            log::error!("unable to report press on pin {pin}: {e}");
        }
    }
}
