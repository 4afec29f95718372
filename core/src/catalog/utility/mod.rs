//! Services every accessory or bridge carries for identification.

pub mod accessory_information;
pub mod protocol_information;
