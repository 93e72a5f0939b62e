//! Domain types for ReplayLab

pub mod bar;
pub mod fill;
pub mod order;
pub mod position;
pub mod snapshot;

pub use bar::{BarError, PriceBar};
pub use fill::Fill;
pub use order::{OrderIntent, OrderSide, OrderType};
pub use position::{Position, QUANTITY_EPSILON};
pub use snapshot::DataSnapshot;

/// Symbol type alias
pub type Symbol = String;
