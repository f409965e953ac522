pub mod aggregate;
pub mod align;
pub mod collect;
pub mod config;
pub mod driver;
pub mod grid;
pub mod ground_truth;
pub mod output;
pub mod registry;
pub mod table;
pub mod util;
