//! Registered migration scripts, in version order.

mod m0001_init_ch;
mod m0002_add_sessions;
mod m0003_widen_columns;
mod m0004_order_keys;
mod m0005_session_replay;

pub use m0001_init_ch::InitClickHouse;
pub use m0002_add_sessions::AddSessions;
pub use m0003_widen_columns::WidenColumns;
pub use m0004_order_keys::OrderKeys;
pub use m0005_session_replay::SessionReplay;

use crate::migration::Migration;

/// Every script, ascending by version.
pub fn all() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(InitClickHouse),
        Box::new(AddSessions),
        Box::new(WidenColumns),
        Box::new(OrderKeys),
        Box::new(SessionReplay),
    ]
}
