//! Timed writes: a controller registers a transaction id with a time to live
//! through `PUT /prepare`, then sends the write carrying that `pid`.

use serde::Deserialize;

use super::StatusCode;
use crate::data_model::Database;

const MAX_TIMED_WRITES: usize = 16;

#[derive(Debug, Deserialize)]
struct PrepareRequest {
    ttl: u64,
    pid: u64,
}

/// Registered transaction ids and their expiry times.
#[derive(Debug, Default)]
pub struct TimedWrites {
    expiry: heapless::FnvIndexMap<u64, u64, MAX_TIMED_WRITES>,
}

impl TimedWrites {
    /// Registers `pid` until `now + ttl_ms`. Returns false when the table is full.
    pub fn prepare(&mut self, pid: u64, ttl_ms: u64, now: u64) -> bool {
        self.purge(now);
        self.expiry.insert(pid, now.saturating_add(ttl_ms)).is_ok()
    }

    /// Removes `pid`; true when it was registered and has not expired.
    pub fn consume(&mut self, pid: u64, now: u64) -> bool {
        self.expiry.remove(&pid).is_some_and(|expiry| now <= expiry)
    }

    pub fn purge(&mut self, now: u64) {
        let expired: heapless::Vec<u64, MAX_TIMED_WRITES> = self
            .expiry
            .iter()
            .filter(|(_, expiry)| now > **expiry)
            .map(|(pid, _)| *pid)
            .collect();
        for pid in expired {
            log::debug!("timed write {pid} expired");
            self.expiry.remove(&pid);
        }
    }

    pub fn len(&self) -> usize {
        self.expiry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiry.is_empty()
    }
}

impl Database {
    /// Handles a `PUT /prepare` body, `{"ttl":<ms>,"pid":<id>}`.
    pub fn prepare_write(&mut self, body: &[u8], now: u64) -> crate::Result<StatusCode> {
        let request: PrepareRequest = serde_json::from_slice(body)?;
        if self.timed_writes.prepare(request.pid, request.ttl, now) {
            log::debug!("timed write {} armed for {} ms", request.pid, request.ttl);
            Ok(StatusCode::Ok)
        } else {
            log::warn!("no room for timed write {}", request.pid);
            Ok(StatusCode::Busy)
        }
    }

    pub fn purge_timed_writes(&mut self, now: u64) {
        self.timed_writes.purge(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccessoryConfig;

    #[test]
    fn pids_are_single_use_and_expire() {
        let mut writes = TimedWrites::default();
        assert!(writes.prepare(7, 100, 1_000));
        assert!(writes.consume(7, 1_100));
        assert!(!writes.consume(7, 1_100));

        assert!(writes.prepare(8, 100, 1_000));
        assert!(!writes.consume(8, 1_101));
        assert!(!writes.consume(9, 0));
    }

    #[test]
    fn purge_drops_expired() {
        let mut writes = TimedWrites::default();
        writes.prepare(1, 10, 0);
        writes.prepare(2, 1_000, 0);
        writes.purge(500);
        assert_eq!(writes.len(), 1);
        assert!(writes.consume(2, 500));
    }

    #[test]
    fn table_is_bounded() {
        let mut writes = TimedWrites::default();
        for pid in 0..MAX_TIMED_WRITES as u64 {
            assert!(writes.prepare(pid, 1_000, 0));
        }
        assert!(!writes.prepare(99, 1_000, 0));
        // expired entries make room again
        assert!(writes.prepare(99, 1_000, 2_000));
    }

    #[test]
    fn prepare_request_body() {
        let mut db = Database::new(AccessoryConfig::default());
        assert_eq!(
            db.prepare_write(br#"{"ttl":2500,"pid":11}"#, 0).unwrap(),
            StatusCode::Ok
        );
        assert!(db.timed_writes.consume(11, 2_500));
        assert!(db.prepare_write(br#"{"ttl":"soon"}"#, 0).is_err());
    }
}
