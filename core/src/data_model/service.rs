use super::{
    characteristic::{Characteristic, CharacteristicBuilder},
    database::Database,
    handler::{ServiceContext, ServiceHandler},
    ServiceId, Value,
};
use crate::{
    catalog::{CharacteristicType, ServiceType},
    interaction_model::PendingChange,
    storage::Storage,
};

pub struct Service {
    pub(crate) aid: u32,
    pub(crate) iid: u32,
    kind: &'static ServiceType,
    pub(crate) primary: bool,
    pub(crate) hidden: bool,
    pub(crate) linked: Vec<ServiceId>,
    /// Button pins routed to this service's handler.
    pub(crate) buttons: Vec<u8>,
    pub(crate) characteristics: Vec<Characteristic>,
    pub(crate) handler: Box<dyn ServiceHandler>,
}

impl Service {
    pub(crate) fn new(
        kind: &'static ServiceType,
        aid: u32,
        iid: u32,
        handler: Box<dyn ServiceHandler>,
    ) -> Self {
        Self {
            aid,
            iid,
            kind,
            primary: false,
            hidden: false,
            linked: Vec::new(),
            buttons: Vec::new(),
            characteristics: Vec::new(),
            handler,
        }
    }

    pub fn id(&self) -> ServiceId {
        ServiceId {
            aid: self.aid,
            iid: self.iid,
        }
    }

    pub fn iid(&self) -> u32 {
        self.iid
    }

    pub fn kind(&self) -> &'static ServiceType {
        self.kind
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn linked(&self) -> &[ServiceId] {
        &self.linked
    }

    pub fn characteristics(&self) -> &[Characteristic] {
        &self.characteristics
    }

    pub fn characteristic(&self, kind: &CharacteristicType) -> Option<&Characteristic> {
        self.characteristics.iter().find(|c| c.kind().id == kind.id)
    }

    /// Runs `f` against the handler with a context over this service.
    pub(crate) fn with_handler<R>(
        &mut self,
        notifications: &mut Vec<PendingChange>,
        storage: &mut dyn Storage,
        now: u64,
        f: impl FnOnce(&mut dyn ServiceHandler, &mut ServiceContext) -> R,
    ) -> R {
        let mut ctx = ServiceContext {
            aid: self.aid,
            characteristics: &mut self.characteristics,
            notifications,
            storage,
            now,
        };
        f(self.handler.as_mut(), &mut ctx)
    }
}

/// Declares the characteristics and attributes of a freshly added service.
pub struct ServiceBuilder<'a> {
    pub(crate) db: &'a mut Database,
    pub(crate) accessory: usize,
    pub(crate) index: usize,
}

impl ServiceBuilder<'_> {
    fn service(&mut self) -> &mut Service {
        &mut self.db.accessories[self.accessory].services[self.index]
    }

    pub fn id(&self) -> ServiceId {
        self.db.accessories[self.accessory].services[self.index].id()
    }

    pub fn primary(&mut self) -> &mut Self {
        self.service().primary = true;
        self
    }

    pub fn hidden(&mut self) -> &mut Self {
        self.service().hidden = true;
        self
    }

    /// Links another service of the same accessory, checked at validation.
    pub fn link(&mut self, other: ServiceId) -> &mut Self {
        self.service().linked.push(other);
        self
    }

    /// Routes presses on `pin` to this service's handler.
    pub fn add_button(&mut self, pin: u8) -> &mut Self {
        self.service().buttons.push(pin);
        self
    }

    pub fn add_characteristic(
        &mut self,
        kind: &'static CharacteristicType,
        value: impl Into<Value>,
    ) -> CharacteristicBuilder<'_> {
        let value = match value.into().coerce(kind.format) {
            Ok(value) => value,
            Err(e) => {
                self.db
                    .log
                    .fatal(format!("initial value of Characteristic {}: {e}", kind.name));
                kind.initial_value()
            }
        };

        let sessions = self.db.config.sessions();
        let accessory = &mut self.db.accessories[self.accessory];
        let aid = accessory.aid;
        let iid = accessory.next_iid();
        let service = &mut accessory.services[self.index];
        let service_name = service.kind.name;
        let supported = service.kind.supports(kind);
        let repeated = service.characteristic(kind).is_some();
        service
            .characteristics
            .push(Characteristic::new(kind, aid, iid, value, sessions));
        let index = service.characteristics.len() - 1;

        let log = &mut self.db.log;
        log.line(format!("      +Characteristic {} IID={iid}", kind.name));
        if !supported {
            log.fatal(format!(
                "Service {service_name} does not support Characteristic {}",
                kind.name
            ));
        }
        if repeated {
            log.fatal(format!(
                "Characteristic {} repeated in Service {service_name}",
                kind.name
            ));
        }

        CharacteristicBuilder {
            db: &mut *self.db,
            accessory: self.accessory,
            service: self.index,
            index,
        }
    }

    /// Declares a characteristic with its type's initial value.
    pub fn add_default(&mut self, kind: &'static CharacteristicType) -> CharacteristicBuilder<'_> {
        self.add_characteristic(kind, kind.initial_value())
    }
}
