//! The update engine behind `PUT /characteristics`.
//!
//! A write is applied in three phases. Every target is resolved and its
//! value staged; then each service with staged values runs its update hook
//! once and the service's targets are committed or rolled back together;
//! finally subscription instructions are applied to the targets that have
//! not failed.

use core::fmt;

use serde::{
    de::{IgnoredAny, MapAccess, SeqAccess, Visitor},
    Deserialize, Deserializer,
};
use serde_json::Value as Json;

use super::{PendingChange, StatusCode};
use crate::{
    data_model::{CharacteristicId, Database, Format, Permissions, Value},
    storage::Storage,
};

#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    pub characteristics: Vec<WriteItem>,
    #[serde(default)]
    pub pid: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct WriteItem {
    pub aid: u32,
    pub iid: u32,
    #[serde(default)]
    pub value: Option<Json>,
    #[serde(default)]
    pub ev: Option<Json>,
}

/// Per-target results of a write, in request order.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    pub results: Vec<PendingChange>,
}

impl WriteOutcome {
    /// Every target succeeded; answered with 204 and no body.
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|r| r.status.is_ok())
    }

    pub fn status(&self, id: CharacteristicId) -> Option<StatusCode> {
        self.results.iter().find(|r| r.id == id).map(|r| r.status)
    }
}

/// Number of targets in a write body, without building the request.
pub fn count_targets(body: &[u8]) -> crate::Result<usize> {
    let count: TargetCount = serde_json::from_slice(body)?;
    Ok(count.0)
}

struct TargetCount(usize);

#[derive(Deserialize)]
#[serde(field_identifier, rename_all = "lowercase")]
enum Field {
    Characteristics,
    #[serde(other)]
    Other,
}

impl<'de> Deserialize<'de> for TargetCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RequestVisitor;

        impl<'de> Visitor<'de> for RequestVisitor {
            type Value = usize;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a write request object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<usize, A::Error> {
                let mut count = 0;
                while let Some(field) = map.next_key::<Field>()? {
                    match field {
                        Field::Characteristics => count = map.next_value::<ItemCount>()?.0,
                        Field::Other => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(count)
            }
        }

        deserializer.deserialize_map(RequestVisitor).map(TargetCount)
    }
}

struct ItemCount(usize);

impl<'de> Deserialize<'de> for ItemCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ItemsVisitor;

        impl<'de> Visitor<'de> for ItemsVisitor {
            type Value = usize;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an array of characteristics")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<usize, A::Error> {
                let mut count = 0;
                while seq.next_element::<IgnoredAny>()?.is_some() {
                    count += 1;
                }
                Ok(count)
            }
        }

        deserializer.deserialize_seq(ItemsVisitor).map(ItemCount)
    }
}

type Position = (usize, usize, usize);

impl Database {
    /// Applies a write from `session`. A malformed body is an error; every
    /// per-target problem is reported through the outcome.
    pub fn update_characteristics(
        &mut self,
        body: &[u8],
        session: usize,
        storage: &mut dyn Storage,
        now: u64,
    ) -> crate::Result<WriteOutcome> {
        // result records are sized by a counting pass before the request is built
        let mut results: Vec<PendingChange> = Vec::with_capacity(count_targets(body)?);
        let request: WriteRequest = serde_json::from_slice(body)?;
        results.extend(
            request
                .characteristics
                .iter()
                .map(|item| request_record(item, session)),
        );

        if let Some(pid) = request.pid {
            if !self.timed_writes.consume(pid, now) {
                log::warn!("write refers to expired or unknown timed write {pid}");
                for result in &mut results {
                    result.fail(StatusCode::InvalidValue);
                }
                return Ok(WriteOutcome { results });
            }
        }

        let positions = self.stage(&request.characteristics, &mut results);
        self.run_update_hooks(&positions, &mut results, storage, now);
        self.apply_notify_flags(&positions, &mut results, session);

        Ok(WriteOutcome { results })
    }

    fn stage(&mut self, items: &[WriteItem], results: &mut [PendingChange]) -> Vec<Option<Position>> {
        let mut positions = Vec::with_capacity(items.len());
        for (item, result) in items.iter().zip(results.iter_mut()) {
            let position = self.position(result.id);
            positions.push(position);
            let Some((a, s, c)) = position else {
                result.fail(StatusCode::UnknownResource);
                continue;
            };
            let Some(json) = &item.value else {
                continue;
            };
            let chr = &mut self.accessories[a].services[s].characteristics[c];
            if !chr.writable() {
                result.fail(StatusCode::ReadOnly);
                continue;
            }
            let Some(value) = Value::from_json(chr.format(), json) else {
                log::debug!("{}: cannot parse {json} as {}", result.id, chr.format());
                result.fail(StatusCode::InvalidValue);
                continue;
            };
            if !chr.stage(value) {
                log::warn!(
                    "{} ({}) written with {} outside its range, accepting",
                    chr.kind().name,
                    result.id,
                    chr.new_value()
                );
                result.out_of_range = true;
            }
        }
        positions
    }

    fn run_update_hooks(
        &mut self,
        positions: &[Option<Position>],
        results: &mut [PendingChange],
        storage: &mut dyn Storage,
        now: u64,
    ) {
        // services holding staged values, in order of first appearance
        let mut services: Vec<(usize, usize)> = Vec::new();
        for (position, result) in positions.iter().zip(results.iter()) {
            if let Some((a, s, _)) = position {
                if result.value.is_some() && result.status.is_ok() && !services.contains(&(*a, *s)) {
                    services.push((*a, *s));
                }
            }
        }

        for (a, s) in services {
            let service = &mut self.accessories[a].services[s];
            let accepted =
                service.with_handler(&mut self.notifications, storage, now, |handler, ctx| {
                    handler.update(ctx)
                });
            if !accepted {
                log::info!(
                    "Service {} (AID={} IID={}) rejected the update",
                    service.kind().name,
                    service.aid,
                    service.iid
                );
            }

            for (position, result) in positions.iter().zip(results.iter_mut()) {
                let Some((ra, rs, c)) = *position else {
                    continue;
                };
                if (ra, rs) != (a, s) || result.value.is_none() || !result.status.is_ok() {
                    continue;
                }
                let chr = &mut service.characteristics[c];
                if !accepted {
                    chr.rollback();
                    result.fail(StatusCode::Unable);
                    continue;
                }
                if chr.is_updated() {
                    chr.commit(now);
                    log::debug!("{} = {}", result.id, chr.value());
                    if let Err(e) = chr.persist(storage) {
                        log::error!("unable to persist {}: {e}", result.id);
                    }
                }
                let mut change = result.clone();
                change.value = Some(chr.value().to_string());
                change.notify = None;
                self.notifications.push(change);
            }
        }
    }

    fn apply_notify_flags(
        &mut self,
        positions: &[Option<Position>],
        results: &mut [PendingChange],
        session: usize,
    ) {
        for (position, result) in positions.iter().zip(results.iter_mut()) {
            let (Some((a, s, c)), Some(enable)) = (*position, result.notify) else {
                continue;
            };
            if !result.status.is_ok() {
                continue;
            }
            let chr = &mut self.accessories[a].services[s].characteristics[c];
            if !chr.permissions().contains(Permissions::EVENTS) {
                result.fail(StatusCode::NotifyNotAllowed);
                continue;
            }
            chr.set_notify(session, enable);
            log::debug!(
                "session {session} {} notifications for {}",
                if enable { "enabled" } else { "disabled" },
                result.id
            );
        }
    }
}

fn request_record(item: &WriteItem, session: usize) -> PendingChange {
    let mut record = PendingChange::remote(CharacteristicId::new(item.aid, item.iid), session);
    record.value = item.value.as_ref().map(Json::to_string);
    if let Some(ev) = &item.ev {
        match Value::from_json(Format::Bool, ev).and_then(|v| v.as_bool()) {
            Some(enable) => record.notify = Some(enable),
            None => record.fail(StatusCode::InvalidValue),
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        catalog::characteristics as chr,
        data_model::{
            database::fixtures::lamp,
            handler::{on_update, EmptyHandler},
        },
        storage::MemoryStorage,
        Error,
    };

    fn write(db: &mut Database, body: &str, storage: &mut MemoryStorage) -> WriteOutcome {
        db.update_characteristics(body.as_bytes(), 0, storage, 1_000)
            .unwrap()
    }

    #[test]
    fn counts_targets_without_parsing_items() {
        for body in [
            r#"{"characteristics":[]}"#,
            r#"{"characteristics":[{"aid":1,"iid":9,"value":true}]}"#,
            r#"{"pid":3,"characteristics":[{"aid":1,"iid":9,"value":1},{"aid":1,"iid":10,"ev":true,"x":[1,{"y":2}]}]}"#,
        ] {
            let parsed: WriteRequest = serde_json::from_str(body).unwrap();
            assert_eq!(
                count_targets(body.as_bytes()).unwrap(),
                parsed.characteristics.len()
            );
        }
        assert_eq!(count_targets(br#"{"other":1}"#).unwrap(), 0);
        assert!(count_targets(b"[1,2]").is_err());
    }

    #[test]
    fn committed_write_is_visible_and_persisted() {
        let storage = MemoryStorage::new();
        let mut first = lamp(EmptyHandler);
        first.db.begin(&mut storage.clone()).unwrap();

        let outcome = write(
            &mut first.db,
            r#"{"characteristics":[{"aid":1,"iid":9,"value":"true"},{"aid":1,"iid":10,"value":80}]}"#,
            &mut storage.clone(),
        );
        assert!(outcome.all_ok());
        let on = first.db.find(first.on).unwrap();
        assert_eq!(on.value(), &Value::Bool(true));
        assert_eq!(on.time_since_update(1_000), 0);
        assert!(!on.is_updated());
        assert_eq!(first.db.pending_notifications().len(), 2);

        let mut restarted = lamp(EmptyHandler);
        restarted.db.begin(&mut storage.clone()).unwrap();
        assert_eq!(
            restarted.db.find(restarted.on).unwrap().value(),
            &Value::Bool(true)
        );
        assert_eq!(
            restarted.db.find(restarted.brightness).unwrap().value(),
            &Value::Int(80)
        );
    }

    #[test]
    fn read_only_write_is_rejected() {
        let mut lamp = lamp(EmptyHandler);
        let mut storage = MemoryStorage::new();
        let outcome = write(
            &mut lamp.db,
            r#"{"characteristics":[{"aid":1,"iid":11,"value":"Kitchen"}]}"#,
            &mut storage,
        );
        let status = outcome.status(lamp.name).unwrap();
        assert_eq!(status, StatusCode::ReadOnly);
        assert!(status.is_unauthorized());
        assert_eq!(
            lamp.db.find(lamp.name).unwrap().value(),
            &Value::from("Desk")
        );
        assert!(lamp.db.pending_notifications().is_empty());
    }

    #[test]
    fn rejected_hook_rolls_back_service() {
        let mut lamp = lamp(on_update(|_| false));
        let mut storage = MemoryStorage::new();
        let outcome = write(
            &mut lamp.db,
            r#"{"characteristics":[{"aid":1,"iid":9,"value":1},{"aid":1,"iid":10,"value":10}]}"#,
            &mut storage,
        );
        assert_eq!(outcome.status(lamp.on), Some(StatusCode::Unable));
        assert_eq!(outcome.status(lamp.brightness), Some(StatusCode::Unable));
        for id in [lamp.on, lamp.brightness] {
            let chr = lamp.db.find(id).unwrap();
            assert_eq!(chr.value(), chr.new_value());
            assert!(!chr.is_updated());
        }
        assert_eq!(lamp.db.find(lamp.brightness).unwrap().value(), &Value::Int(50));
        assert!(lamp.db.pending_notifications().is_empty());
    }

    #[test]
    fn hook_sees_whole_batch_staged() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let mut lamp = lamp(on_update(move |ctx| {
            log.borrow_mut().push((
                ctx.is_updated(&chr::ON),
                ctx.get::<i32>(&chr::BRIGHTNESS),
                ctx.get_new::<i32>(&chr::BRIGHTNESS),
            ));
            true
        }));
        let mut storage = MemoryStorage::new();
        write(
            &mut lamp.db,
            r#"{"characteristics":[{"aid":1,"iid":9,"value":true},{"aid":1,"iid":10,"value":70}]}"#,
            &mut storage,
        );
        assert_eq!(*seen.borrow(), [(true, Some(50), Some(70))]);
    }

    #[test]
    fn per_target_statuses() {
        let mut lamp = lamp(EmptyHandler);
        let mut storage = MemoryStorage::new();
        let outcome = write(
            &mut lamp.db,
            r#"{"characteristics":[
                {"aid":1,"iid":40,"value":1},
                {"aid":1,"iid":9,"value":"maybe"},
                {"aid":1,"iid":10,"value":140},
                {"aid":1,"iid":11,"ev":true},
                {"aid":1,"iid":9,"ev":true}
            ]}"#,
            &mut storage,
        );
        let statuses: Vec<_> = outcome.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            [
                StatusCode::UnknownResource,
                StatusCode::InvalidValue,
                StatusCode::Ok,
                StatusCode::NotifyNotAllowed,
                StatusCode::Ok,
            ]
        );
        assert!(!outcome.all_ok());
        assert!(outcome.results[2].out_of_range);
        assert_eq!(
            lamp.db.find(lamp.brightness).unwrap().value(),
            &Value::Int(140)
        );
        assert!(lamp.db.find(lamp.on).unwrap().notify_enabled(0));
        assert!(!lamp.db.find(lamp.on).unwrap().notify_enabled(1));
    }

    #[test]
    fn timed_writes_gate_the_whole_request() {
        let mut lamp = lamp(EmptyHandler);
        let mut storage = MemoryStorage::new();
        let body = r#"{"pid":42,"characteristics":[{"aid":1,"iid":9,"value":1},{"aid":1,"iid":10,"value":5}]}"#;

        let outcome = write(&mut lamp.db, body, &mut storage);
        assert!(outcome
            .results
            .iter()
            .all(|r| r.status == StatusCode::InvalidValue));
        assert_eq!(lamp.db.find(lamp.on).unwrap().value(), &Value::Bool(false));

        lamp.db.prepare_write(br#"{"ttl":500,"pid":42}"#, 900).unwrap();
        assert!(write(&mut lamp.db, body, &mut storage).all_ok());
        assert_eq!(lamp.db.find(lamp.on).unwrap().value(), &Value::Bool(true));
        // consumed
        assert!(!write(&mut lamp.db, body, &mut storage).all_ok());
    }

    #[test]
    fn malformed_body_is_an_error() {
        let mut lamp = lamp(EmptyHandler);
        let mut storage = MemoryStorage::new();
        assert!(matches!(
            lamp.db
                .update_characteristics(b"{\"characteristics\":", 0, &mut storage, 0),
            Err(Error::Json(_))
        ));
        assert!(lamp
            .db
            .update_characteristics(b"[]", 0, &mut storage, 0)
            .is_err());

        let body = br#"{"characteristics":[{"aid":1,"iid":9,"value":1},{"aid":7,"iid":1,"value":1}]}"#;
        let outcome = lamp
            .db
            .update_characteristics(body, 0, &mut storage, 0)
            .unwrap();
        assert_eq!(outcome.results.len(), count_targets(body).unwrap());
        assert!(outcome.results.capacity() >= 2);
    }
}
