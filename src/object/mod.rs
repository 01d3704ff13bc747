mod core;
mod counter;
mod drop_object;

pub use self::core::{Live, Obs, Own};
pub use self::counter::live_counter_count;
