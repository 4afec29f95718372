use std::collections::HashSet;

use sha2::{Digest, Sha384};

use super::{
    accessory::{Accessory, AccessoryBuilder},
    handler::{self, ButtonPress},
    Characteristic, CharacteristicId, Value,
};
use crate::{
    catalog::utility::{accessory_information, protocol_information},
    config::AccessoryConfig,
    constants::{CONFIG_DIGEST_LEN, MAX_ACCESSORIES, PERSIST_IID_MASK},
    interaction_model::{PendingChange, ReadFlags, Report, TimedWrites},
    storage::{ConfigSignature, Storage, StorageError},
    Error,
};

/// Human readable record of how the database was declared and validated.
#[derive(Debug, Clone, Default)]
pub struct ConfigLog {
    text: String,
    fatal_errors: usize,
    warnings: usize,
}

impl ConfigLog {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fatal_errors(&self) -> usize {
        self.fatal_errors
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }

    pub(crate) fn line(&mut self, line: String) {
        log::debug!("{}", line.trim_start());
        self.text.push_str(&line);
        self.text.push('\n');
    }

    pub(crate) fn fatal(&mut self, message: String) {
        log::error!("{message}");
        self.fatal_errors += 1;
        self.text.push_str("*** FATAL ERROR: ");
        self.text.push_str(&message);
        self.text.push('\n');
    }

    pub(crate) fn warning(&mut self, message: String) {
        log::warn!("{message}");
        self.warnings += 1;
        self.text.push_str("*** WARNING: ");
        self.text.push_str(&message);
        self.text.push('\n');
    }
}

/// Outcome of [`Database::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigStatus {
    pub fatal_errors: usize,
    pub warnings: usize,
    /// Advertised configuration number, 0 when the database was not signed.
    pub config_number: u32,
    pub valid: bool,
}

pub struct Database {
    pub(crate) config: AccessoryConfig,
    pub(crate) accessories: Vec<Accessory>,
    pub(crate) log: ConfigLog,
    pub(crate) signature: ConfigSignature,
    pub(crate) notifications: Vec<PendingChange>,
    pub(crate) timed_writes: TimedWrites,
}

impl Database {
    pub fn new(config: AccessoryConfig) -> Self {
        Self {
            config,
            accessories: Vec::new(),
            log: ConfigLog::default(),
            signature: ConfigSignature::default(),
            notifications: Vec::new(),
            timed_writes: TimedWrites::default(),
        }
    }

    pub fn config(&self) -> &AccessoryConfig {
        &self.config
    }

    /// Declares an accessory numbered one past the last declared one.
    pub fn add_accessory(&mut self) -> AccessoryBuilder<'_> {
        let aid = self.accessories.last().map_or(1, |a| a.aid + 1);
        self.add_accessory_with_aid(aid)
    }

    pub fn add_accessory_with_aid(&mut self, aid: u32) -> AccessoryBuilder<'_> {
        self.log.line(format!("+Accessory AID={aid}"));
        self.accessories.push(Accessory::new(aid));
        let index = self.accessories.len() - 1;
        AccessoryBuilder { db: self, index }
    }

    pub fn accessories(&self) -> &[Accessory] {
        &self.accessories
    }

    pub fn accessory(&self, aid: u32) -> Option<&Accessory> {
        self.accessories.iter().find(|a| a.aid == aid)
    }

    pub fn log(&self) -> &ConfigLog {
        &self.log
    }

    pub fn signature(&self) -> &ConfigSignature {
        &self.signature
    }

    pub fn is_valid(&self) -> bool {
        self.log.fatal_errors == 0
    }

    /// Changes queued for the next notification cycle.
    pub fn pending_notifications(&self) -> &[PendingChange] {
        &self.notifications
    }

    pub(crate) fn position(&self, id: CharacteristicId) -> Option<(usize, usize, usize)> {
        let a = self.accessories.iter().position(|a| a.aid == id.aid)?;
        self.accessories[a]
            .services
            .iter()
            .enumerate()
            .find_map(|(s, service)| {
                service
                    .characteristics
                    .iter()
                    .position(|c| c.iid() == id.iid)
                    .map(|c| (a, s, c))
            })
    }

    pub fn find(&self, id: CharacteristicId) -> Option<&Characteristic> {
        let (a, s, c) = self.position(id)?;
        Some(&self.accessories[a].services[s].characteristics[c])
    }

    pub(crate) fn find_mut(&mut self, id: CharacteristicId) -> Option<&mut Characteristic> {
        let (a, s, c) = self.position(id)?;
        Some(&mut self.accessories[a].services[s].characteristics[c])
    }

    pub(crate) fn characteristics(&self) -> impl Iterator<Item = &Characteristic> {
        self.accessories
            .iter()
            .flat_map(|a| a.services.iter())
            .flat_map(|s| s.characteristics.iter())
    }

    pub(crate) fn characteristics_mut(&mut self) -> impl Iterator<Item = &mut Characteristic> {
        self.accessories
            .iter_mut()
            .flat_map(|a| a.services.iter_mut())
            .flat_map(|s| s.characteristics.iter_mut())
    }

    /// Restores persisted values, validates the declared tree and, when it
    /// is valid, signs it.
    pub fn begin(&mut self, storage: &mut dyn Storage) -> crate::Result<ConfigStatus> {
        for chr in self.characteristics_mut() {
            chr.restore(storage)?;
        }

        self.validate();

        let valid = self.is_valid();
        if valid {
            self.sign(storage)?;
        } else {
            log::error!(
                "database has {} fatal errors and will not be advertised",
                self.log.fatal_errors
            );
        }

        Ok(ConfigStatus {
            fatal_errors: self.log.fatal_errors,
            warnings: self.log.warnings,
            config_number: if valid { self.signature.number } else { 0 },
            valid,
        })
    }

    fn validate(&mut self) {
        let mut problems = Vec::new();
        let mut warnings = Vec::new();

        match self.accessories.first() {
            None => problems.push("no accessories declared".to_string()),
            Some(first) if first.aid != 1 => {
                problems.push(format!("first accessory has AID={}, expected 1", first.aid))
            }
            Some(_) => {}
        }
        if self.accessories.len() > MAX_ACCESSORIES {
            problems.push(format!(
                "{} accessories declared, at most {MAX_ACCESSORIES} allowed",
                self.accessories.len()
            ));
        }
        if self.accessories.len() > 1 && !self.config.bridge {
            warnings.push(format!(
                "{} accessories declared without bridge mode",
                self.accessories.len()
            ));
        }

        let mut aids = HashSet::new();
        for accessory in &self.accessories {
            if accessory.aid == 0 {
                problems.push("AID=0 is reserved, accessory ids must be positive".to_string());
            }
            if !aids.insert(accessory.aid) {
                problems.push(format!("AID={} used by more than one accessory", accessory.aid));
            }
            if accessory.service(&accessory_information::SERVICE).is_none() {
                problems.push(format!(
                    "accessory AID={} has no AccessoryInformation service",
                    accessory.aid
                ));
            }
            for service in &accessory.services {
                for required in service.kind().required {
                    if service.characteristic(required).is_none() {
                        problems.push(format!(
                            "Service {} (AID={} IID={}) is missing required Characteristic {}",
                            service.kind().name,
                            accessory.aid,
                            service.iid,
                            required.name
                        ));
                    }
                }
                for link in &service.linked {
                    let found = link.aid == accessory.aid
                        && accessory.services.iter().any(|s| s.iid == link.iid);
                    if !found {
                        problems.push(format!(
                            "Service {} (AID={} IID={}) links to unknown service {}.{}",
                            service.kind().name,
                            accessory.aid,
                            service.iid,
                            link.aid,
                            link.iid
                        ));
                    }
                }
                for chr in &service.characteristics {
                    if chr.persist_key().is_some() && chr.iid() > PERSIST_IID_MASK {
                        warnings.push(format!(
                            "persisted Characteristic {} at IID={} shares its storage key",
                            chr.kind().name,
                            chr.iid()
                        ));
                    }
                }
            }
        }

        if self.config.bridge {
            if let Some(bridge) = self.accessories.first() {
                let identity_only = bridge.services.iter().all(|s| {
                    s.kind().id == accessory_information::SERVICE_ID
                        || s.kind().id == protocol_information::SERVICE_ID
                });
                if !identity_only {
                    problems.push(
                        "bridge accessory may only carry identity services".to_string(),
                    );
                }
            }
        }

        for message in problems {
            self.log.fatal(message);
        }
        for message in warnings {
            self.log.warning(message);
        }
        self.log.line(format!(
            "Configuration complete: {} fatal errors, {} warnings",
            self.log.fatal_errors, self.log.warnings
        ));
    }

    /// SHA-384 over the database rendered without values.
    pub fn compute_digest(&self) -> crate::Result<[u8; CONFIG_DIGEST_LEN]> {
        let json = self.encode_to_vec(&Report::Accessories(ReadFlags::SIGNATURE))?;
        let mut digest = [0; CONFIG_DIGEST_LEN];
        digest.copy_from_slice(&Sha384::digest(&json));
        Ok(digest)
    }

    fn sign(&mut self, storage: &mut dyn Storage) -> crate::Result<()> {
        let digest = self.compute_digest()?;
        let previous = match ConfigSignature::load(storage) {
            Ok(previous) => previous,
            Err(StorageError::Corrupt(message)) => {
                log::warn!("ignoring stored configuration record: {message}");
                None
            }
            Err(e) => return Err(e.into()),
        };

        match previous {
            Some(previous) if previous.digest == digest && previous.number != 0 => {
                log::info!("configuration unchanged, number {}", previous.number);
                self.signature = previous;
            }
            previous => {
                let signature = ConfigSignature {
                    number: previous.unwrap_or_default().next_number(),
                    digest,
                };
                signature.save(storage)?;
                log::info!(
                    "configuration changed, number now {} ({})",
                    signature.number,
                    hex::encode(&digest[..8])
                );
                self.signature = signature;
            }
        }
        Ok(())
    }

    /// Sets a value from non-protocol code. The change is persisted when the
    /// characteristic is, and notified to subscribed sessions.
    pub fn set_value(
        &mut self,
        id: CharacteristicId,
        value: impl Into<Value>,
        storage: &mut dyn Storage,
        now: u64,
    ) -> crate::Result<()> {
        let (a, s, c) = self.position(id).ok_or(Error::UnknownCharacteristic {
            aid: id.aid,
            iid: id.iid,
        })?;
        let chr = &mut self.accessories[a].services[s].characteristics[c];
        handler::apply_local(chr, value.into(), &mut self.notifications, storage, now)
    }

    /// Runs every service's periodic hook.
    pub fn run_loops(&mut self, storage: &mut dyn Storage, now: u64) {
        for accessory in &mut self.accessories {
            for service in &mut accessory.services {
                service.with_handler(&mut self.notifications, storage, now, |handler, ctx| {
                    handler.run_loop(ctx)
                });
            }
        }
    }

    /// Routes a press to the first service listening on its pin.
    pub fn dispatch_press(
        &mut self,
        press: ButtonPress,
        storage: &mut dyn Storage,
        now: u64,
    ) -> bool {
        let service = self
            .accessories
            .iter_mut()
            .flat_map(|a| a.services.iter_mut())
            .find(|s| s.buttons.contains(&press.pin));
        match service {
            Some(service) => {
                service.with_handler(&mut self.notifications, storage, now, |handler, ctx| {
                    handler.button(ctx, press.pin, press.press)
                });
                true
            }
            None => {
                log::warn!("press on pin {} has no listening service", press.pin);
                false
            }
        }
    }
}
