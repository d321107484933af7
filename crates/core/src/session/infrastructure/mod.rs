pub mod latest_slot;
pub mod presenter;
pub(crate) mod shared_state;
pub mod snapshot_cell;
pub mod still_capture;
pub(crate) mod workers;
