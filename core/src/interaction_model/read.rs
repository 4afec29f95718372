//! Rendering of the database and of characteristic reads into HAP JSON.
//!
//! Every report goes through [`Database::encode`], which runs the same
//! rendering code for the measuring and the writing pass.

use super::{PendingChange, StatusCode};
use crate::{
    data_model::{Characteristic, CharacteristicId, Database, Permissions, Service},
    encoder::Encoder,
    Error,
};

bitflags::bitflags! {
    /// Attributes included for each characteristic.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReadFlags: u8 {
        const AID = 1;
        const META = 2;
        const PERMS = 4;
        const TYPE = 8;
        const EV = 16;
        const DESC = 32;
        const NO_VALUE = 64;
        /// Every attribute, value included.
        const ALL = Self::AID.bits()
            | Self::META.bits()
            | Self::PERMS.bits()
            | Self::TYPE.bits()
            | Self::EV.bits()
            | Self::DESC.bits();
        /// The `/accessories` listing.
        const DATABASE = Self::META.bits()
            | Self::PERMS.bits()
            | Self::TYPE.bits()
            | Self::DESC.bits();
        /// Input of the configuration digest: the listing without values.
        const SIGNATURE = Self::DATABASE.bits() | Self::NO_VALUE.bits();
    }
}

/// What to render.
#[derive(Debug, Clone, Copy)]
pub enum Report<'a> {
    /// The whole database.
    Accessories(ReadFlags),
    /// An id-filtered read on behalf of `session`.
    Characteristics {
        ids: &'a [CharacteristicId],
        flags: ReadFlags,
        session: usize,
    },
    /// Per-target statuses of a write.
    Results(&'a [PendingChange]),
    /// Current values of changed characteristics.
    Event(&'a [CharacteristicId]),
}

/// Query of a `GET /characteristics` request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub ids: Vec<CharacteristicId>,
    pub flags: ReadFlags,
}

impl ReadRequest {
    /// Parses `id=1.9,1.10&meta=1&perms=1&type=1&ev=1`.
    pub fn parse(query: &str) -> crate::Result<Self> {
        let mut ids = Vec::new();
        let mut flags = ReadFlags::AID;
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let enabled = matches!(value, "1" | "true");
            match key {
                "id" => {
                    for id in value.split(',') {
                        ids.push(id.parse()?);
                    }
                }
                "meta" if enabled => flags |= ReadFlags::META,
                "perms" if enabled => flags |= ReadFlags::PERMS,
                "type" if enabled => flags |= ReadFlags::TYPE,
                "ev" if enabled => flags |= ReadFlags::EV,
                _ => {}
            }
        }
        if ids.is_empty() {
            return Err(Error::InvalidId(query.to_string()));
        }
        Ok(Self { ids, flags })
    }
}

impl Database {
    /// Renders `report`. Without a buffer only the length is computed; with
    /// one, the bytes are written and the same length is returned.
    pub fn encode(&self, report: &Report, buf: Option<&mut [u8]>) -> crate::Result<usize> {
        let mut enc = match buf {
            Some(buf) => Encoder::new(buf),
            None => Encoder::measure(),
        };
        match *report {
            Report::Accessories(flags) => self.encode_accessories(&mut enc, flags),
            Report::Characteristics {
                ids,
                flags,
                session,
            } => self.encode_read(&mut enc, ids, flags, session),
            Report::Results(results) => encode_results(&mut enc, results),
            Report::Event(ids) => self.encode_event(&mut enc, ids),
        }
        enc.finish()
    }

    pub fn encode_to_vec(&self, report: &Report) -> crate::Result<Vec<u8>> {
        let len = self.encode(report, None)?;
        let mut buf = vec![0; len];
        self.encode(report, Some(buf.as_mut_slice()))?;
        Ok(buf)
    }

    /// Status of reading one characteristic.
    pub fn read_status(&self, id: CharacteristicId) -> StatusCode {
        match self.find(id) {
            None => StatusCode::UnknownResource,
            Some(chr) if !chr.readable() => StatusCode::WriteOnly,
            Some(_) => StatusCode::Ok,
        }
    }

    /// A read answered with per-entry statuses (HTTP 207).
    pub fn is_multi_status(&self, ids: &[CharacteristicId]) -> bool {
        ids.iter().any(|id| !self.read_status(*id).is_ok())
    }

    fn encode_accessories(&self, enc: &mut Encoder, flags: ReadFlags) {
        enc.push_str("{\"accessories\":[");
        for (i, accessory) in self.accessories().iter().enumerate() {
            if i > 0 {
                enc.push_str(",");
            }
            write!(enc, "{{\"aid\":{},\"services\":[", accessory.aid());
            for (j, service) in accessory.services().iter().enumerate() {
                if j > 0 {
                    enc.push_str(",");
                }
                encode_service(enc, service, flags);
            }
            enc.push_str("]}");
        }
        enc.push_str("]}");
    }

    fn encode_read(
        &self,
        enc: &mut Encoder,
        ids: &[CharacteristicId],
        flags: ReadFlags,
        session: usize,
    ) {
        let multi_status = self.is_multi_status(ids);
        enc.push_str("{\"characteristics\":[");
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                enc.push_str(",");
            }
            match (self.find(*id), self.read_status(*id)) {
                (Some(chr), StatusCode::Ok) => {
                    let status = multi_status.then_some(StatusCode::Ok);
                    encode_characteristic(enc, chr, flags | ReadFlags::AID, Some(session), status);
                }
                (_, status) => {
                    write!(
                        enc,
                        "{{\"aid\":{},\"iid\":{},\"status\":{}}}",
                        id.aid, id.iid, status as i32
                    );
                }
            }
        }
        enc.push_str("]}");
    }

    fn encode_event(&self, enc: &mut Encoder, ids: &[CharacteristicId]) {
        enc.push_str("{\"characteristics\":[");
        let mut first = true;
        for chr in ids.iter().filter_map(|id| self.find(*id)) {
            if !first {
                enc.push_str(",");
            }
            first = false;
            write!(
                enc,
                "{{\"aid\":{},\"iid\":{},\"value\":{}}}",
                chr.id().aid,
                chr.iid(),
                chr.value()
            );
        }
        enc.push_str("]}");
    }
}

fn encode_results(enc: &mut Encoder, results: &[PendingChange]) {
    enc.push_str("{\"characteristics\":[");
    for (i, result) in results.iter().enumerate() {
        if i > 0 {
            enc.push_str(",");
        }
        write!(
            enc,
            "{{\"aid\":{},\"iid\":{},\"status\":{}}}",
            result.id.aid, result.id.iid, result.status as i32
        );
    }
    enc.push_str("]}");
}

fn encode_service(enc: &mut Encoder, service: &Service, flags: ReadFlags) {
    write!(enc, "{{\"iid\":{},\"type\":", service.iid());
    enc.push_json_str(service.kind().id);
    if service.is_primary() {
        enc.push_str(",\"primary\":true");
    }
    if service.is_hidden() {
        enc.push_str(",\"hidden\":true");
    }
    if !service.linked().is_empty() {
        enc.push_str(",\"linked\":[");
        for (i, link) in service.linked().iter().enumerate() {
            if i > 0 {
                enc.push_str(",");
            }
            write!(enc, "{}", link.iid);
        }
        enc.push_str("]");
    }
    enc.push_str(",\"characteristics\":[");
    for (i, chr) in service.characteristics().iter().enumerate() {
        if i > 0 {
            enc.push_str(",");
        }
        encode_characteristic(enc, chr, flags, None, None);
    }
    enc.push_str("]}");
}

fn encode_characteristic(
    enc: &mut Encoder,
    chr: &Characteristic,
    flags: ReadFlags,
    session: Option<usize>,
    status: Option<StatusCode>,
) {
    enc.push_str("{");
    if flags.contains(ReadFlags::AID) {
        write!(enc, "\"aid\":{},", chr.id().aid);
    }
    write!(enc, "\"iid\":{}", chr.iid());
    if flags.contains(ReadFlags::TYPE) {
        enc.push_str(",\"type\":");
        enc.push_json_str(chr.kind().id);
    }
    if !flags.contains(ReadFlags::NO_VALUE) && chr.readable() {
        write!(enc, ",\"value\":{}", chr.value());
    }
    if flags.contains(ReadFlags::PERMS) {
        enc.push_str(",\"perms\":[");
        for (i, name) in chr.permissions().wire_names().enumerate() {
            if i > 0 {
                enc.push_str(",");
            }
            write!(enc, "\"{name}\"");
        }
        enc.push_str("]");
    }
    if flags.contains(ReadFlags::META) {
        write!(enc, ",\"format\":\"{}\"", chr.format());
    }
    if flags.contains(ReadFlags::DESC) {
        if let Some(description) = chr.description() {
            enc.push_str(",\"description\":");
            enc.push_json_str(description);
        }
    }
    if flags.contains(ReadFlags::META) && chr.has_custom_range() {
        if let Some(bounds) = chr.bounds() {
            write!(enc, ",\"minValue\":{},\"maxValue\":{}", bounds.min, bounds.max);
            if bounds.step.as_f64().is_some_and(|step| step > 0.0) {
                write!(enc, ",\"minStep\":{}", bounds.step);
            }
        }
    }
    if flags.contains(ReadFlags::EV) && chr.permissions().contains(Permissions::EVENTS) {
        let enabled = session.is_some_and(|s| chr.notify_enabled(s));
        write!(enc, ",\"ev\":{enabled}");
    }
    if let Some(status) = status {
        write!(enc, ",\"status\":{}", status as i32);
    }
    enc.push_str("}");
}
