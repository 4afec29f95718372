use super::{
    database::Database, handler::ServiceHandler, service::ServiceBuilder, Characteristic, Service,
};
use crate::catalog::ServiceType;

pub struct Accessory {
    pub(crate) aid: u32,
    /// Last instance id handed out; services and characteristics share it.
    iid_count: u32,
    pub(crate) services: Vec<Service>,
}

impl Accessory {
    pub(crate) fn new(aid: u32) -> Self {
        Self {
            aid,
            iid_count: 0,
            services: Vec::new(),
        }
    }

    pub(crate) fn next_iid(&mut self) -> u32 {
        self.iid_count += 1;
        self.iid_count
    }

    pub fn aid(&self) -> u32 {
        self.aid
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn service(&self, kind: &ServiceType) -> Option<&Service> {
        self.services.iter().find(|s| s.kind().id == kind.id)
    }

    pub fn characteristic(&self, iid: u32) -> Option<&Characteristic> {
        self.services
            .iter()
            .flat_map(|s| s.characteristics.iter())
            .find(|c| c.iid() == iid)
    }
}

/// Adds services to a freshly declared accessory.
pub struct AccessoryBuilder<'a> {
    pub(crate) db: &'a mut Database,
    pub(crate) index: usize,
}

impl AccessoryBuilder<'_> {
    pub fn aid(&self) -> u32 {
        self.db.accessories[self.index].aid
    }

    pub fn add_service(
        &mut self,
        kind: &'static ServiceType,
        handler: impl ServiceHandler + 'static,
    ) -> ServiceBuilder<'_> {
        let accessory = &mut self.db.accessories[self.index];
        let iid = accessory.next_iid();
        accessory
            .services
            .push(Service::new(kind, accessory.aid, iid, Box::new(handler)));
        let index = accessory.services.len() - 1;
        self.db
            .log
            .line(format!("   +Service {} IID={iid}", kind.name));
        ServiceBuilder {
            db: &mut *self.db,
            accessory: self.index,
            index,
        }
    }
}
