pub mod bar;
pub mod loader;
pub mod table;

pub use bar::{Bar, BarError};
pub use loader::{load_csv, parse_timestamp};
pub use table::{PriceColumn, PriceTable, UnknownColumn};
