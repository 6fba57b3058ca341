mod cart;
mod catalog;
mod document;
mod log;
mod reservation;
mod tent;

pub use cart::{Cart, CartLine};
pub use catalog::{slugify, Category, Item};
pub use document::{
    make_grid, StateDocument, DEFAULT_PIN, DEFAULT_TENT_COUNT, MAX_TENT_COUNT,
    OBJECT_MERGE_FIELDS, REPLACE_ARRAY_FIELDS,
};
pub use log::{push_log, LogEntry, MAX_LOG_ENTRIES};
pub use reservation::{
    Customer, Reservation, ReservationStatus, HOLD_MINUTES, MAX_HOLD_MINUTES,
};
pub use tent::{round_coord, Tent, TentState};
