use crate::{data_model::Format, storage::StorageError};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid characteristic id '{0}'")]
    InvalidId(String),

    #[error("characteristic {aid}.{iid} does not exist")]
    UnknownCharacteristic { aid: u32, iid: u32 },

    #[error("accessory {aid} has no {name} characteristic in this service")]
    MissingCharacteristic { aid: u32, name: &'static str },

    #[error("output buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("value cannot be represented as {format}")]
    Conversion { format: Format },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
