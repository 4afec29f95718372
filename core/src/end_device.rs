//! The accessory server: startup and the cooperative polling cycle.

use crate::{
    constants::{MAX_CONNECTIONS, MAX_PRESSES_PER_CYCLE},
    data_model::{database::ConfigStatus, CharacteristicId, Database, Value},
    interaction_model::{ReadFlags, ReadRequest, Report, StatusCode},
    session_context::Sessions,
    storage::Storage,
    transport::{
        mdns::Advertisement, ButtonInput, Incoming, Method, Outgoing, Request, Transport,
    },
    util::time::Clock,
    Error,
};

pub struct EndDevice<S, C> {
    database: Database,
    storage: S,
    clock: C,
    sessions: Sessions,
    /// Set by a successful [`EndDevice::begin`].
    running: bool,
}

impl<S: Storage, C: Clock> EndDevice<S, C> {
    pub fn new(database: Database, storage: S, clock: C) -> Self {
        let sessions = Sessions::new(database.config().sessions());
        Self {
            database,
            storage,
            clock,
            sessions,
            running: false,
        }
    }

    /// Restores persisted values, validates and signs the database.
    /// Requests are only served when the database turned out valid.
    pub fn begin(&mut self) -> crate::Result<ConfigStatus> {
        let status = self.database.begin(&mut self.storage)?;
        log::info!(
            "accessory database ready: {} fatal errors, {} warnings, configuration number {}",
            status.fatal_errors,
            status.warnings,
            status.config_number
        );
        self.running = status.valid;
        Ok(status)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// mDNS record for the current configuration number.
    pub fn advertisement(&self, paired: bool) -> Advertisement {
        Advertisement::new(self.database.config(), self.database.signature(), paired)
    }

    /// Sets a value from application code, e.g. a sensor reading.
    /// Subscribers hear about it in the next poll.
    pub fn set_value(&mut self, id: CharacteristicId, value: impl Into<Value>) -> crate::Result<()> {
        let now = self.clock.now_ms();
        self.database.set_value(id, value, &mut self.storage, now)
    }

    /// One cycle: at most one message per session slot, service loops,
    /// button presses, then notifications.
    pub fn poll(&mut self, transport: &mut impl Transport, buttons: &mut impl ButtonInput) {
        if !self.running {
            return;
        }
        let now = self.clock.now_ms();
        self.database.purge_timed_writes(now);

        let order: heapless::Vec<usize, MAX_CONNECTIONS> = self.sessions.round_robin().collect();
        for session in order {
            let Some(incoming) = transport.poll(session) else {
                continue;
            };
            match incoming {
                Incoming::Opened => {
                    self.sessions.open(session, now);
                }
                Incoming::Request(request) => {
                    if !self.sessions.is_active(session) {
                        log::debug!("request on idle session {session}, opening it");
                        if !self.sessions.open(session, now) {
                            continue;
                        }
                    }
                    self.sessions.record_request(session);
                    let response = self.handle(session, &request, now);
                    transport.send(session, response);
                }
                Incoming::Closed => {
                    if self.sessions.close(session) {
                        self.database.clear_notify(session);
                    }
                }
            }
        }

        self.database.run_loops(&mut self.storage, now);

        for _ in 0..MAX_PRESSES_PER_CYCLE {
            let Some(press) = buttons.poll_press() else {
                break;
            };
            self.database.dispatch_press(press, &mut self.storage, now);
        }

        let active = self.sessions.active();
        match self.database.drain_notifications(&active) {
            Ok(events) => {
                for (session, body) in events {
                    transport.send(session, Outgoing::Event { body });
                }
            }
            Err(e) => log::error!("dropping notifications: {e}"),
        }
    }

    fn handle(&mut self, session: usize, request: &Request, now: u64) -> Outgoing {
        let (path, query) = request.split_path();
        log::debug!("session {session}: {} {}", request.method.as_str(), request.path);

        let result = match (request.method, path) {
            (Method::Get, "/accessories") => self
                .database
                .encode_to_vec(&Report::Accessories(ReadFlags::DATABASE))
                .map(|body| (200, body)),
            (Method::Get, "/characteristics") => self.read(session, query.unwrap_or_default()),
            (Method::Put, "/characteristics") => self.write(session, &request.body, now),
            (Method::Put, "/prepare") => self.prepare(&request.body, now),
            _ => {
                log::warn!("no route for {} {}", request.method.as_str(), path);
                Ok((404, Vec::new()))
            }
        };

        let (status, body) = match result {
            Ok(response) => response,
            Err(e @ (Error::Json(_) | Error::InvalidId(_))) => {
                log::warn!("bad request from session {session}: {e}");
                (400, status_body(StatusCode::InvalidValue))
            }
            Err(e) => {
                log::error!("failed to answer session {session}: {e}");
                (500, status_body(StatusCode::Unable))
            }
        };
        Outgoing::Response { status, body }
    }

    fn read(&self, session: usize, query: &str) -> crate::Result<(u16, Vec<u8>)> {
        let request = ReadRequest::parse(query)?;
        let status = if self.database.is_multi_status(&request.ids) {
            207
        } else {
            200
        };
        let body = self.database.encode_to_vec(&Report::Characteristics {
            ids: &request.ids,
            flags: request.flags,
            session,
        })?;
        Ok((status, body))
    }

    fn write(&mut self, session: usize, body: &[u8], now: u64) -> crate::Result<(u16, Vec<u8>)> {
        let outcome =
            self.database
                .update_characteristics(body, session, &mut self.storage, now)?;
        if outcome.all_ok() {
            return Ok((204, Vec::new()));
        }
        let body = self
            .database
            .encode_to_vec(&Report::Results(&outcome.results))?;
        Ok((207, body))
    }

    fn prepare(&mut self, body: &[u8], now: u64) -> crate::Result<(u16, Vec<u8>)> {
        let status = self.database.prepare_write(body, now)?;
        Ok((200, status_body(status)))
    }
}

fn status_body(status: StatusCode) -> Vec<u8> {
    format!("{{\"status\":{}}}", status as i32).into_bytes()
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value as Json};

    use super::*;
    use crate::{
        catalog::{
            characteristics as chr, temperature_sensor,
            utility::accessory_information::AccessoryInformation,
        },
        config::AccessoryConfig,
        data_model::{database::fixtures::lamp, handler::EmptyHandler},
        storage::MemoryStorage,
        transport::{NoButtons, ScriptedTransport},
        util::time::ManualClock,
    };

    fn device(clock: &ManualClock) -> (EndDevice<MemoryStorage, &ManualClock>, CharacteristicId, CharacteristicId) {
        let lamp = lamp(EmptyHandler);
        let mut device = EndDevice::new(lamp.db, MemoryStorage::new(), clock);
        let status = device.begin().unwrap();
        assert!(status.valid);
        assert_eq!(status.config_number, 1);
        (device, lamp.on, lamp.brightness)
    }

    fn response(message: &Outgoing) -> (u16, Json) {
        match message {
            Outgoing::Response { status, body } if body.is_empty() => (*status, Json::Null),
            Outgoing::Response { status, body } => (*status, serde_json::from_slice(body).unwrap()),
            Outgoing::Event { .. } => panic!("expected a response, got {message:?}"),
        }
    }

    #[test]
    fn serves_the_database_listing() {
        let clock = ManualClock::new(0);
        let (mut device, _, _) = device(&clock);
        let mut transport = ScriptedTransport::new();
        transport.push(0, Incoming::Opened);
        transport.push(0, Incoming::Request(Request::get("/accessories")));
        device.poll(&mut transport, &mut NoButtons);
        device.poll(&mut transport, &mut NoButtons);

        let sent = transport.take_sent(0);
        assert_eq!(sent.len(), 1);
        let (status, body) = response(&sent[0]);
        assert_eq!(status, 200);
        assert_eq!(body["accessories"][0]["aid"], 1);
        assert_eq!(body["accessories"][0]["services"][1]["iid"], 8);
        assert_eq!(body["accessories"][0]["services"][1]["primary"], true);
    }

    #[test]
    fn write_is_answered_and_fanned_out() {
        let clock = ManualClock::new(0);
        let (mut device, _, brightness) = device(&clock);
        let mut transport = ScriptedTransport::new();
        transport.push(0, Incoming::Opened);
        transport.push(1, Incoming::Opened);
        transport.push(
            1,
            Incoming::Request(Request::put(
                "/characteristics",
                r#"{"characteristics":[{"aid":1,"iid":10,"ev":true}]}"#,
            )),
        );
        transport.push(
            0,
            Incoming::Request(Request::put(
                "/characteristics",
                r#"{"characteristics":[{"aid":1,"iid":10,"value":75}]}"#,
            )),
        );
        device.poll(&mut transport, &mut NoButtons);
        device.poll(&mut transport, &mut NoButtons);

        assert_eq!(device.database().find(brightness).unwrap().value(), &Value::Int(75));
        assert_eq!(
            transport.take_sent(0),
            [Outgoing::Response {
                status: 204,
                body: Vec::new()
            }]
        );
        let sent = transport.take_sent(1);
        assert_eq!(sent.len(), 2);
        assert_eq!(response(&sent[0]).0, 204);
        match &sent[1] {
            Outgoing::Event { body } => assert_eq!(
                serde_json::from_slice::<Json>(body).unwrap(),
                json!({"characteristics":[{"aid":1,"iid":10,"value":75}]})
            ),
            other => panic!("expected an event, got {other:?}"),
        }
    }

    #[test]
    fn reads_report_statuses() {
        let clock = ManualClock::new(0);
        let (mut device, _, _) = device(&clock);
        let mut transport = ScriptedTransport::new();
        transport.push(0, Incoming::Request(Request::get("/characteristics?id=1.10")));
        transport.push(0, Incoming::Request(Request::get("/characteristics?id=1.10,1.99")));
        transport.push(0, Incoming::Request(Request::get("/characteristics?id=x")));
        for _ in 0..3 {
            device.poll(&mut transport, &mut NoButtons);
        }

        let sent = transport.take_sent(0);
        let (status, body) = response(&sent[0]);
        assert_eq!(status, 200);
        assert_eq!(body, json!({"characteristics":[{"aid":1,"iid":10,"value":50}]}));

        let (status, body) = response(&sent[1]);
        assert_eq!(status, 207);
        assert_eq!(body["characteristics"][0]["status"], 0);
        assert_eq!(body["characteristics"][1]["status"], -70409);

        let (status, body) = response(&sent[2]);
        assert_eq!(status, 400);
        assert_eq!(body, json!({"status":-70410}));
    }

    #[test]
    fn bad_requests_and_unknown_routes() {
        let clock = ManualClock::new(0);
        let (mut device, _, _) = device(&clock);
        let mut transport = ScriptedTransport::new();
        transport.push(0, Incoming::Request(Request::put("/characteristics", "{")));
        transport.push(0, Incoming::Request(Request::get("/pairings")));
        transport.push(
            0,
            Incoming::Request(Request::put(
                "/characteristics",
                r#"{"characteristics":[{"aid":1,"iid":10,"value":"bright"}]}"#,
            )),
        );
        for _ in 0..3 {
            device.poll(&mut transport, &mut NoButtons);
        }

        let sent = transport.take_sent(0);
        assert_eq!(response(&sent[0]).0, 400);
        assert_eq!(response(&sent[1]).0, 404);
        let (status, body) = response(&sent[2]);
        assert_eq!(status, 207);
        assert_eq!(
            body,
            json!({"characteristics":[{"aid":1,"iid":10,"status":-70410}]})
        );
    }

    #[test]
    fn timed_write_expires() {
        let clock = ManualClock::new(1_000);
        let (mut device, on, _) = device(&clock);
        let mut transport = ScriptedTransport::new();
        let write = r#"{"characteristics":[{"aid":1,"iid":9,"value":true}],"pid":42}"#;

        transport.push(0, Incoming::Request(Request::put("/prepare", r#"{"ttl":500,"pid":42}"#)));
        device.poll(&mut transport, &mut NoButtons);
        transport.push(0, Incoming::Request(Request::put("/characteristics", write)));
        clock.advance(400);
        device.poll(&mut transport, &mut NoButtons);

        let sent = transport.take_sent(0);
        assert_eq!(response(&sent[0]), (200, json!({"status":0})));
        assert_eq!(response(&sent[1]).0, 204);
        assert_eq!(device.database().find(on).unwrap().value(), &Value::Bool(true));

        transport.push(0, Incoming::Request(Request::put("/prepare", r#"{"ttl":500,"pid":43}"#)));
        device.poll(&mut transport, &mut NoButtons);
        clock.advance(501);
        transport.push(
            0,
            Incoming::Request(Request::put(
                "/characteristics",
                r#"{"characteristics":[{"aid":1,"iid":9,"value":false}],"pid":43}"#,
            )),
        );
        device.poll(&mut transport, &mut NoButtons);
        let sent = transport.take_sent(0);
        let (status, body) = response(&sent[1]);
        assert_eq!(status, 207);
        assert_eq!(body["characteristics"][0]["status"], -70410);
        assert_eq!(device.database().find(on).unwrap().value(), &Value::Bool(true));
    }

    #[test]
    fn one_message_per_session_per_cycle() {
        let clock = ManualClock::new(0);
        let (mut device, _, _) = device(&clock);
        let mut transport = ScriptedTransport::new();
        transport.push(0, Incoming::Request(Request::get("/accessories")));
        transport.push(0, Incoming::Request(Request::get("/accessories")));
        transport.push(2, Incoming::Request(Request::get("/accessories")));
        device.poll(&mut transport, &mut NoButtons);
        assert_eq!(transport.queued(), 1);
        assert_eq!(transport.sent.len(), 2);
        device.poll(&mut transport, &mut NoButtons);
        assert_eq!(transport.queued(), 0);
    }

    #[test]
    fn closed_sessions_stop_receiving_events() {
        let clock = ManualClock::new(0);
        let (mut device, on, _) = device(&clock);
        let mut transport = ScriptedTransport::new();
        transport.push(
            1,
            Incoming::Request(Request::put(
                "/characteristics",
                r#"{"characteristics":[{"aid":1,"iid":9,"ev":true}]}"#,
            )),
        );
        device.poll(&mut transport, &mut NoButtons);
        assert!(device.database().find(on).unwrap().notify_enabled(1));

        transport.push(1, Incoming::Closed);
        device.poll(&mut transport, &mut NoButtons);
        assert!(!device.sessions().is_active(1));
        assert!(!device.database().find(on).unwrap().notify_enabled(1));

        transport.sent.clear();
        device.set_value(on, true).unwrap();
        device.poll(&mut transport, &mut NoButtons);
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn idle_until_begin() {
        let clock = ManualClock::new(0);
        let lamp = lamp(EmptyHandler);
        let mut device = EndDevice::new(lamp.db, MemoryStorage::new(), &clock);
        let mut transport = ScriptedTransport::new();
        transport.push(0, Incoming::Request(Request::get("/accessories")));
        device.poll(&mut transport, &mut NoButtons);
        assert_eq!(transport.queued(), 1);
        assert!(!device.is_running());
    }

    #[test]
    fn sensor_readings_reach_subscribers() {
        let clock = ManualClock::new(0);
        let mut db = Database::new(AccessoryConfig::default());
        let temperature = {
            let mut acc = db.add_accessory();
            AccessoryInformation::new("Thermometer").declare(&mut acc);
            let mut sensor = acc.add_service(&temperature_sensor::SERVICE, EmptyHandler);
            sensor.add_characteristic(&chr::STATUS_ACTIVE, true);
            sensor
                .add_characteristic(&chr::CURRENT_TEMPERATURE, 20.0)
                .range(-40, 60, 1)
                .id()
        };
        let mut device = EndDevice::new(db, MemoryStorage::new(), &clock);
        assert!(device.begin().unwrap().valid);

        let mut transport = ScriptedTransport::new();
        transport.push(
            3,
            Incoming::Request(Request::put(
                "/characteristics",
                format!(
                    r#"{{"characteristics":[{{"aid":1,"iid":{},"ev":"1"}}]}}"#,
                    temperature.iid
                ),
            )),
        );
        device.poll(&mut transport, &mut NoButtons);
        transport.sent.clear();

        device.set_value(temperature, -12.5).unwrap();
        device.poll(&mut transport, &mut NoButtons);
        assert_eq!(transport.sent.len(), 1);
        let (session, message) = &transport.sent[0];
        assert_eq!(*session, 3);
        match message {
            Outgoing::Event { body } => assert_eq!(
                serde_json::from_slice::<Json>(body).unwrap(),
                json!({"characteristics":[{"aid":1,"iid":temperature.iid,"value":-12.5}]})
            ),
            other => panic!("expected an event, got {other:?}"),
        }

        let read = format!("/characteristics?id={temperature}&meta=1&ev=1");
        transport.push(3, Incoming::Request(Request::get(read)));
        device.poll(&mut transport, &mut NoButtons);
        let (status, body) = response(&transport.sent[1].1);
        assert_eq!(status, 200);
        let entry = &body["characteristics"][0];
        assert_eq!(entry["format"], "float");
        assert_eq!(entry["minValue"], -40.0);
        assert_eq!(entry["ev"], true);
    }

    #[test]
    fn advertises_signed_configuration() {
        let clock = ManualClock::new(0);
        let (device, _, _) = device(&clock);
        let advertisement = device.advertisement(false);
        assert_eq!(advertisement.config_number, 1);
        assert!(advertisement.txt_records().contains(&"c#=1".to_string()));
    }
}
