mod counter;
mod store;

pub use counter::InMemoryCounter;
pub use store::InMemoryRecordStore;
