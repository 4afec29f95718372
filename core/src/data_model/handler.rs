//! Application behaviour attached to a service.
//!
//! Each service owns one [`ServiceHandler`]. The database calls it with a
//! [`ServiceContext`] scoped to that service's characteristics: once per
//! remote write touching the service, once per poll cycle, and for every
//! button press routed to the service.

use num_traits::NumCast;

use super::{Characteristic, Value};
use crate::{
    catalog::CharacteristicType,
    interaction_model::PendingChange,
    storage::Storage,
    Error,
};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum PressType {
    Single = 0,
    Double = 1,
    Long = 2,
}

/// A debounced press delivered by the physical-input collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPress {
    pub pin: u8,
    pub press: PressType,
}

pub trait ServiceHandler {
    /// Called once per remote write with the staged values visible through
    /// [`ServiceContext::new_value`]. Returning false rolls every staged
    /// value of the service back and fails the write.
    fn update(&mut self, _ctx: &mut ServiceContext) -> bool {
        true
    }

    /// Called once per poll cycle.
    fn run_loop(&mut self, _ctx: &mut ServiceContext) {}

    fn button(&mut self, _ctx: &mut ServiceContext, _pin: u8, _press: PressType) {}
}

/// Accepts every write and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyHandler;

impl ServiceHandler for EmptyHandler {}

/// Handler built from an update closure, see [`on_update`].
pub struct UpdateFn<F>(F);

impl<F> ServiceHandler for UpdateFn<F>
where
    F: FnMut(&mut ServiceContext<'_>) -> bool,
{
    fn update(&mut self, ctx: &mut ServiceContext) -> bool {
        (self.0)(ctx)
    }
}

pub fn on_update<F>(f: F) -> UpdateFn<F>
where
    F: FnMut(&mut ServiceContext<'_>) -> bool,
{
    UpdateFn(f)
}

/// A service's view of its own characteristics during a handler call.
pub struct ServiceContext<'a> {
    pub(crate) aid: u32,
    pub(crate) characteristics: &'a mut [Characteristic],
    pub(crate) notifications: &'a mut Vec<PendingChange>,
    pub(crate) storage: &'a mut dyn Storage,
    pub(crate) now: u64,
}

impl ServiceContext<'_> {
    pub fn aid(&self) -> u32 {
        self.aid
    }

    /// Milliseconds on the server clock, fixed for the whole poll cycle.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn characteristic(&self, kind: &CharacteristicType) -> Option<&Characteristic> {
        self.characteristics.iter().find(|c| c.kind().id == kind.id)
    }

    pub fn characteristics(&self) -> &[Characteristic] {
        self.characteristics
    }

    pub fn is_updated(&self, kind: &CharacteristicType) -> bool {
        self.characteristic(kind).is_some_and(Characteristic::is_updated)
    }

    pub fn value(&self, kind: &CharacteristicType) -> Option<&Value> {
        self.characteristic(kind).map(Characteristic::value)
    }

    pub fn new_value(&self, kind: &CharacteristicType) -> Option<&Value> {
        self.characteristic(kind).map(Characteristic::new_value)
    }

    pub fn get<T: NumCast>(&self, kind: &CharacteristicType) -> Option<T> {
        self.characteristic(kind)?.get()
    }

    pub fn get_new<T: NumCast>(&self, kind: &CharacteristicType) -> Option<T> {
        self.characteristic(kind)?.get_new()
    }

    pub fn time_since_update(&self, kind: &CharacteristicType) -> Option<u64> {
        self.characteristic(kind)
            .map(|c| c.time_since_update(self.now))
    }

    /// Sets a value from the accessory side and queues a notification.
    pub fn set_value(
        &mut self,
        kind: &CharacteristicType,
        value: impl Into<Value>,
    ) -> crate::Result<()> {
        let aid = self.aid;
        let chr = self
            .characteristics
            .iter_mut()
            .find(|c| c.kind().id == kind.id)
            .ok_or(Error::MissingCharacteristic { aid, name: kind.name })?;
        apply_local(
            chr,
            value.into(),
            self.notifications,
            &mut *self.storage,
            self.now,
        )
    }
}

pub(crate) fn apply_local(
    chr: &mut Characteristic,
    value: Value,
    notifications: &mut Vec<PendingChange>,
    storage: &mut dyn Storage,
    now: u64,
) -> crate::Result<()> {
    if !chr.set_local(value, now)? {
        log::warn!(
            "{} ({}) set to {} outside its range",
            chr.kind().name,
            chr.id(),
            chr.value()
        );
    }
    chr.persist(storage)?;
    notifications.push(PendingChange::local(chr.id(), chr.value()));
    Ok(())
}
