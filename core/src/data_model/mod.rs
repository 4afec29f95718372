//! The Accessory → Service → Characteristic object graph.

use core::{fmt, str::FromStr};

use crate::Error;

pub mod accessory;
pub mod characteristic;
pub mod database;
pub mod handler;
pub mod service;
pub mod value;

pub use accessory::{Accessory, AccessoryBuilder};
pub use characteristic::{Characteristic, CharacteristicBuilder};
pub use database::{ConfigLog, Database};
pub use service::{Service, ServiceBuilder};
pub use value::{Format, Value};

bitflags::bitflags! {
    /// Characteristic permissions (HAP Table 6-4).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u8 {
        const PAIRED_READ = 1;
        const PAIRED_WRITE = 2;
        const EVENTS = 4;
        const ADDITIONAL_AUTH = 8;
        const TIMED_WRITE = 16;
        const HIDDEN = 32;
        const WRITE_RESPONSE = 64;
    }
}

impl Permissions {
    const WIRE_NAMES: [(Permissions, &'static str); 7] = [
        (Permissions::PAIRED_READ, "pr"),
        (Permissions::PAIRED_WRITE, "pw"),
        (Permissions::EVENTS, "ev"),
        (Permissions::ADDITIONAL_AUTH, "aa"),
        (Permissions::TIMED_WRITE, "tw"),
        (Permissions::HIDDEN, "hd"),
        (Permissions::WRITE_RESPONSE, "wr"),
    ];

    /// Wire names of the set permissions, lowest bit first.
    pub fn wire_names(self) -> impl Iterator<Item = &'static str> {
        Self::WIRE_NAMES
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }
}

/// Address of a characteristic, written `aid.iid` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharacteristicId {
    pub aid: u32,
    pub iid: u32,
}

impl CharacteristicId {
    pub const fn new(aid: u32, iid: u32) -> Self {
        Self { aid, iid }
    }
}

impl fmt::Display for CharacteristicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.aid, self.iid)
    }
}

impl FromStr for CharacteristicId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidId(s.to_string());
        let (aid, iid) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            aid: aid.parse().map_err(|_| invalid())?,
            iid: iid.parse().map_err(|_| invalid())?,
        })
    }
}

/// Address of a service within the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId {
    pub aid: u32,
    pub iid: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_wire_names() {
        let perms = Permissions::PAIRED_READ | Permissions::PAIRED_WRITE | Permissions::EVENTS;
        assert_eq!(perms.wire_names().collect::<Vec<_>>(), ["pr", "pw", "ev"]);
        assert_eq!(Permissions::empty().wire_names().count(), 0);
    }

    #[test]
    fn parses_characteristic_ids() {
        assert_eq!(
            "1.9".parse::<CharacteristicId>().unwrap(),
            CharacteristicId::new(1, 9)
        );
        assert_eq!(CharacteristicId::new(2, 10).to_string(), "2.10");
        assert!("1".parse::<CharacteristicId>().is_err());
        assert!("a.b".parse::<CharacteristicId>().is_err());
        assert!("1.-3".parse::<CharacteristicId>().is_err());
    }
}
