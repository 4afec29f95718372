use num_traits::{NumCast, ToPrimitive};

use super::{database::Database, CharacteristicId, Format, Permissions, Value};
use crate::{
    catalog::CharacteristicType,
    constants::MAX_CONNECTIONS,
    storage::{persist_key, PersistKey, Storage, StorageError},
};

/// Inclusive numeric bounds and step, held in the characteristic's format.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub min: Value,
    pub max: Value,
    pub step: Value,
}

#[derive(Debug)]
pub struct Characteristic {
    aid: u32,
    iid: u32,
    kind: &'static CharacteristicType,
    perms: Permissions,
    value: Value,
    /// Staged value of a remote write, equal to `value` outside an update.
    new_value: Value,
    bounds: Option<Bounds>,
    custom_range: bool,
    description: Option<String>,
    /// One flag per session slot.
    notify: heapless::Vec<bool, MAX_CONNECTIONS>,
    persist_key: Option<PersistKey>,
    updated: bool,
    update_time: u64,
}

impl Characteristic {
    pub(crate) fn new(
        kind: &'static CharacteristicType,
        aid: u32,
        iid: u32,
        value: Value,
        sessions: usize,
    ) -> Self {
        let bounds = kind
            .default_bounds()
            .map(|(min, max, step)| Bounds { min, max, step });
        let mut notify = heapless::Vec::new();
        // capped at capacity
        let _ = notify.resize(sessions.min(MAX_CONNECTIONS), false);
        Self {
            aid,
            iid,
            kind,
            perms: kind.perms,
            new_value: value.clone(),
            value,
            bounds,
            custom_range: false,
            description: None,
            notify,
            persist_key: None,
            updated: false,
            update_time: 0,
        }
    }

    pub fn id(&self) -> CharacteristicId {
        CharacteristicId::new(self.aid, self.iid)
    }

    pub fn iid(&self) -> u32 {
        self.iid
    }

    pub fn kind(&self) -> &'static CharacteristicType {
        self.kind
    }

    pub fn format(&self) -> Format {
        self.kind.format
    }

    pub fn permissions(&self) -> Permissions {
        self.perms
    }

    pub fn readable(&self) -> bool {
        self.perms.contains(Permissions::PAIRED_READ)
    }

    pub fn writable(&self) -> bool {
        self.perms.contains(Permissions::PAIRED_WRITE)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn new_value(&self) -> &Value {
        &self.new_value
    }

    pub fn get<T: NumCast>(&self) -> Option<T> {
        self.value.get()
    }

    pub fn get_new<T: NumCast>(&self) -> Option<T> {
        self.new_value.get()
    }

    /// Set while a remote write to this characteristic is pending.
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    /// Milliseconds since the value last changed.
    pub fn time_since_update(&self, now: u64) -> u64 {
        now.saturating_sub(self.update_time)
    }

    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    pub fn has_custom_range(&self) -> bool {
        self.custom_range
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn notify_enabled(&self, session: usize) -> bool {
        self.notify.get(session).copied().unwrap_or(false)
    }

    pub fn persist_key(&self) -> Option<&str> {
        self.persist_key.as_deref()
    }

    /// Numeric values must lie within the bounds; other formats always do.
    pub fn in_range(&self, value: &Value) -> bool {
        let (Some(bounds), Some(v)) = (&self.bounds, value.as_f64()) else {
            return true;
        };
        match (bounds.min.as_f64(), bounds.max.as_f64()) {
            (Some(min), Some(max)) => v >= min && v <= max,
            _ => true,
        }
    }

    pub(crate) fn set_notify(&mut self, session: usize, enabled: bool) {
        if let Some(slot) = self.notify.get_mut(session) {
            *slot = enabled;
        }
    }

    /// Stages a remote write. Returns false when the value lies out of range.
    pub(crate) fn stage(&mut self, value: Value) -> bool {
        let in_range = self.in_range(&value);
        self.new_value = value;
        self.updated = true;
        in_range
    }

    pub(crate) fn commit(&mut self, now: u64) {
        self.value = self.new_value.clone();
        self.update_time = now;
        self.updated = false;
    }

    pub(crate) fn rollback(&mut self) {
        self.new_value = self.value.clone();
        self.updated = false;
    }

    /// Sets the value from the accessory side. Returns false when the value
    /// lies out of range; it is kept regardless.
    pub(crate) fn set_local(&mut self, value: Value, now: u64) -> crate::Result<bool> {
        let value = value.coerce(self.format())?;
        let in_range = self.in_range(&value);
        self.new_value = value.clone();
        self.value = value;
        self.update_time = now;
        Ok(in_range)
    }

    pub(crate) fn persist(&self, storage: &mut dyn Storage) -> Result<(), StorageError> {
        let Some(key) = &self.persist_key else {
            return Ok(());
        };
        storage.set_blob(key, &self.value.to_blob())?;
        storage.commit()
    }

    /// Loads the stored value, or stores the current one when none exists.
    pub(crate) fn restore(&mut self, storage: &mut dyn Storage) -> Result<(), StorageError> {
        let Some(key) = &self.persist_key else {
            return Ok(());
        };
        let stored = match storage.get_blob(key)? {
            Some(blob) => match Value::from_blob(self.format(), &blob) {
                Ok(value) => Some(value),
                Err(e) => {
                    log::warn!("discarding stored value of {}: {e}", self.id());
                    None
                }
            },
            None => None,
        };
        match stored {
            Some(value) => {
                log::debug!("restored {} = {value}", self.id());
                self.new_value = value.clone();
                self.value = value;
                Ok(())
            }
            None => self.persist(storage),
        }
    }
}

/// Refines a freshly declared characteristic.
pub struct CharacteristicBuilder<'a> {
    pub(crate) db: &'a mut Database,
    pub(crate) accessory: usize,
    pub(crate) service: usize,
    pub(crate) index: usize,
}

impl CharacteristicBuilder<'_> {
    fn characteristic(&mut self) -> &mut Characteristic {
        &mut self.db.accessories[self.accessory].services[self.service].characteristics
            [self.index]
    }

    pub fn id(&self) -> CharacteristicId {
        self.db.accessories[self.accessory].services[self.service].characteristics[self.index]
            .id()
    }

    /// Keeps the value across restarts.
    pub fn persist(&mut self) -> &mut Self {
        let chr = self.characteristic();
        let key = persist_key(chr.kind.id, chr.aid, chr.iid);
        let name = chr.kind.name;
        let type_id = chr.kind.id;
        chr.persist_key = key.clone();
        if key.is_none() {
            self.db.log.warning(format!(
                "Characteristic {name} has type '{type_id}', which cannot form a storage key; it will not be persisted"
            ));
        }
        self
    }

    pub fn description(&mut self, text: &str) -> &mut Self {
        self.characteristic().description = Some(text.to_string());
        self
    }

    pub fn permissions(&mut self, perms: Permissions) -> &mut Self {
        self.characteristic().perms = perms;
        self
    }

    /// Replaces the default range. Rejected for characteristics whose range
    /// is fixed and for non-numeric formats.
    pub fn range<T: ToPrimitive>(&mut self, min: T, max: T, step: T) -> &mut Self {
        let chr = self.characteristic();
        let (id, name, format) = (chr.id(), chr.kind.name, chr.format());
        let problem = if chr.kind.static_range {
            Some("its range is fixed")
        } else if chr.custom_range {
            Some("its range was already set")
        } else if !format.is_numeric() {
            Some("it is not numeric")
        } else {
            match (
                Value::from_number(format, min),
                Value::from_number(format, max),
                Value::from_number(format, step),
            ) {
                (Ok(min), Ok(max), Ok(step)) => {
                    chr.bounds = Some(Bounds { min, max, step });
                    chr.custom_range = true;
                    None
                }
                _ => Some("the bounds do not fit its format"),
            }
        };
        if let Some(problem) = problem {
            self.db
                .log
                .fatal(format!("cannot set range of {name} ({id}): {problem}"));
        }
        self
    }
}
