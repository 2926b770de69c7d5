pub mod cleaner;

pub use cleaner::{clean, ClampEvent, CleanedRecord, Rejection};
