//! Seams to the host's network stack and physical inputs.
//!
//! The transport owns connection acceptance, pairing and encryption. The
//! accessory only sees already framed requests per session slot and hands
//! back responses and event bodies for the same slot.

use std::collections::VecDeque;

use crate::data_model::handler::ButtonPress;

pub mod mdns;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// A decrypted HTTP request from a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Path including any query string, e.g. `/characteristics?id=1.9`.
    pub path: String,
    pub body: Vec<u8>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: Vec::new(),
        }
    }

    pub fn put(path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body: body.into(),
        }
    }

    /// The path without its query string, and the query string.
    pub fn split_path(&self) -> (&str, Option<&str>) {
        match self.path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (self.path.as_str(), None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A controller connected in this slot.
    Opened,
    Request(Request),
    /// The controller in this slot went away.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Answer to the last request; an empty body is sent without content type.
    Response { status: u16, body: Vec<u8> },
    /// Unsolicited `EVENT/1.0` message.
    Event { body: Vec<u8> },
}

pub trait Transport {
    /// Next message of `session`, if one is ready. Must not block.
    fn poll(&mut self, session: usize) -> Option<Incoming>;

    fn send(&mut self, session: usize, message: Outgoing);
}

/// Debounced presses from buttons wired to the accessory.
pub trait ButtonInput {
    fn poll_press(&mut self) -> Option<ButtonPress>;
}

/// An accessory without buttons.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoButtons;

impl ButtonInput for NoButtons {
    fn poll_press(&mut self) -> Option<ButtonPress> {
        None
    }
}

/// Transport driven by queued messages, for simulations and tests.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    inbox: Vec<VecDeque<Incoming>>,
    /// Everything sent so far, with its session.
    pub sent: Vec<(usize, Outgoing)>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, session: usize, message: Incoming) {
        if self.inbox.len() <= session {
            self.inbox.resize_with(session + 1, VecDeque::new);
        }
        self.inbox[session].push_back(message);
    }

    /// Messages still waiting to be polled.
    pub fn queued(&self) -> usize {
        self.inbox.iter().map(VecDeque::len).sum()
    }

    /// Removes and returns what was sent to `session`.
    pub fn take_sent(&mut self, session: usize) -> Vec<Outgoing> {
        let (taken, kept) = std::mem::take(&mut self.sent)
            .into_iter()
            .partition(|(s, _)| *s == session);
        self.sent = kept;
        taken.into_iter().map(|(_, message)| message).collect()
    }
}

impl Transport for ScriptedTransport {
    fn poll(&mut self, session: usize) -> Option<Incoming> {
        self.inbox.get_mut(session)?.pop_front()
    }

    fn send(&mut self, session: usize, message: Outgoing) {
        self.sent.push((session, message));
    }
}

impl ButtonInput for VecDeque<ButtonPress> {
    fn poll_press(&mut self) -> Option<ButtonPress> {
        self.pop_front()
    }
}
