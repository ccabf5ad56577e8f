//! Database models. Each model lives in its own file and is re-exported here
//! so callers can `use crate::db::models::*;`.

pub mod booking;
pub mod reminder;
pub mod room;

pub use self::booking::*;
pub use self::reminder::*;
pub use self::room::*;
