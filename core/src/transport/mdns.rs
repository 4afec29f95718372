//! Bonjour advertisement of the accessory (`_hap._tcp`).
//!
//! The TXT record carries the configuration number, so it has to be
//! republished whenever [`crate::data_model::Database::begin`] bumps it.

use core::fmt::Write;

use crate::{config::AccessoryConfig, storage::ConfigSignature};

pub const HAP_SERVICE_TYPE: &str = "_hap._tcp";

/// TXT values of the `_hap._tcp` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub name: String,
    pub host_name: String,
    pub port: u16,
    /// `c#`
    pub config_number: u32,
    /// `ff`, pairing feature flags; 0 means no hardware authentication.
    pub feature_flags: u8,
    /// `id`
    pub device_id: String,
    /// `md`
    pub model: String,
    /// `pv`
    pub protocol_version: String,
    /// `s#`, always 1 for IP accessories.
    pub state_number: u8,
    /// `sf`, 1 until a controller has paired.
    pub status_flags: u8,
    /// `ci`
    pub category: u8,
}

impl Advertisement {
    pub fn new(config: &AccessoryConfig, signature: &ConfigSignature, paired: bool) -> Self {
        let suffix: String = config
            .device_id
            .chars()
            .filter(|c| c.is_ascii_hexdigit())
            .collect();
        Self {
            name: config.display_name.clone(),
            host_name: format!("{}-{}", config.host_name_base, suffix),
            port: config.tcp_port,
            config_number: signature.number,
            feature_flags: 0,
            device_id: config.device_id.clone(),
            model: config.model_name.clone(),
            protocol_version: config.protocol_version.clone(),
            state_number: 1,
            status_flags: u8::from(!paired),
            category: config.category as u8,
        }
    }

    /// `key=value` TXT entries in advertisement order.
    pub fn txt_records(&self) -> Vec<String> {
        let txt_values: [(&str, String); 8] = [
            ("c#", self.config_number.to_string()),
            ("ff", self.feature_flags.to_string()),
            ("id", self.device_id.clone()),
            ("md", self.model.clone()),
            ("pv", self.protocol_version.clone()),
            ("s#", self.state_number.to_string()),
            ("sf", self.status_flags.to_string()),
            ("ci", self.category.to_string()),
        ];
        txt_values
            .iter()
            .map(|(key, value)| {
                let mut txt = String::with_capacity(key.len() + value.len() + 1);
                // writing to a String cannot fail
                let _ = write!(txt, "{key}={value}");
                txt
            })
            .collect()
    }
}

#[cfg(feature = "mdns")]
pub use responder::{publish, MdnsService};

#[cfg(feature = "mdns")]
mod responder {
    use std::sync::Mutex;

    use libmdns::{Responder, Service};
    use once_cell::sync::OnceCell;

    use super::{Advertisement, HAP_SERVICE_TYPE};

    static RESPONDER: OnceCell<Mutex<Responder>> = OnceCell::new();

    fn responder() -> std::io::Result<&'static Mutex<Responder>> {
        RESPONDER.get_or_try_init(|| Responder::new().map(Mutex::new))
    }

    /// A registered record; dropping it withdraws the advertisement.
    pub struct MdnsService {
        _service: Service,
    }

    /// Registers the record with the shared responder. Publish again with a
    /// fresh [`Advertisement`] after the configuration number changes.
    pub fn publish(advertisement: &Advertisement) -> std::io::Result<MdnsService> {
        let txts = advertisement.txt_records();
        let txt = txts.iter().map(String::as_str).collect::<Vec<_>>();
        let responder = responder()?
            .lock()
            .map_err(|_| std::io::Error::other("mDNS responder lock poisoned"))?;
        let service = responder.register(
            HAP_SERVICE_TYPE.to_string(),
            advertisement.name.clone(),
            advertisement.port,
            &txt,
        );
        log::info!(
            "advertising {} as {}.local on port {} ({})",
            advertisement.name,
            advertisement.host_name,
            advertisement.port,
            txts.join(" ")
        );
        Ok(MdnsService { _service: service })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Category, constants::CONFIG_DIGEST_LEN};

    #[test]
    fn txt_records_follow_config() {
        let config = AccessoryConfig {
            display_name: "Porch Light".into(),
            device_id: "AA:BB:CC:00:11:22".into(),
            category: Category::Lighting,
            ..Default::default()
        };
        let signature = ConfigSignature {
            number: 3,
            digest: [0; CONFIG_DIGEST_LEN],
        };
        let advertisement = Advertisement::new(&config, &signature, false);
        assert_eq!(advertisement.host_name, "hap-accessory-AABBCC001122");
        assert_eq!(
            advertisement.txt_records(),
            [
                "c#=3",
                "ff=0",
                "id=AA:BB:CC:00:11:22",
                "md=HAP-Accessory",
                "pv=1.1.0",
                "s#=1",
                "sf=1",
                "ci=5",
            ]
        );

        let paired = Advertisement::new(&config, &signature, true);
        assert_eq!(paired.status_flags, 0);
    }
}
