//! Controller interactions with the attribute database: reads, writes,
//! timed-write transactions and event subscriptions.

use crate::data_model::{CharacteristicId, Value};

pub mod read;
pub mod subscribe;
pub mod transaction;
pub mod write;

pub use read::{ReadFlags, ReadRequest, Report};
pub use subscribe::Origin;
pub use transaction::TimedWrites;
pub use write::{count_targets, WriteOutcome};

/// HAP status codes (HAP Table 6-11).
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum StatusCode {
    Ok = 0,
    Unable = -70402,
    Busy = -70403,
    ReadOnly = -70404,
    WriteOnly = -70405,
    NotifyNotAllowed = -70406,
    UnknownResource = -70409,
    InvalidValue = -70410,
    InsufficientAuthorization = -70411,
}

impl StatusCode {
    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }

    /// Permission failures of any kind.
    pub fn is_unauthorized(self) -> bool {
        matches!(
            self,
            StatusCode::ReadOnly
                | StatusCode::WriteOnly
                | StatusCode::NotifyNotAllowed
                | StatusCode::InsufficientAuthorization
        )
    }
}

/// One characteristic touched by a write or a local set.
///
/// Write results and queued notifications share this record. `value` holds
/// the canonical text of the value, `notify` a subscription instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange {
    pub id: CharacteristicId,
    pub value: Option<String>,
    pub notify: Option<bool>,
    pub status: StatusCode,
    pub origin: Origin,
    /// The value was accepted although it lies outside the bounds.
    pub out_of_range: bool,
}

impl PendingChange {
    pub(crate) fn local(id: CharacteristicId, value: &Value) -> Self {
        Self {
            id,
            value: Some(value.to_string()),
            notify: None,
            status: StatusCode::Ok,
            origin: Origin::Local,
            out_of_range: false,
        }
    }

    pub(crate) fn remote(id: CharacteristicId, session: usize) -> Self {
        Self {
            id,
            value: None,
            notify: None,
            status: StatusCode::Ok,
            origin: Origin::Remote(session),
            out_of_range: false,
        }
    }

    pub(crate) fn fail(&mut self, status: StatusCode) {
        if self.status.is_ok() {
            self.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes() {
        assert!(StatusCode::ReadOnly.is_unauthorized());
        assert!(StatusCode::NotifyNotAllowed.is_unauthorized());
        assert!(!StatusCode::UnknownResource.is_unauthorized());
        assert_eq!(StatusCode::InvalidValue as i32, -70410);
    }

    #[test]
    fn first_failure_sticks() {
        let mut change = PendingChange::remote(CharacteristicId::new(1, 9), 0);
        change.fail(StatusCode::ReadOnly);
        change.fail(StatusCode::Unable);
        assert_eq!(change.status, StatusCode::ReadOnly);
    }
}
