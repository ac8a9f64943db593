mod bus;
mod wire;

pub use bus::{Bus, DroppedCounters, Subscription, DEFAULT_TOPIC_CAPACITY};
pub use wire::{decode, encode, BusMessage};
