//! Data Transfer Objects (DTOs)
//!
//! Wire-level payloads and their validation into domain types.

mod trade_dto;

pub use trade_dto::SendTradeDto;
