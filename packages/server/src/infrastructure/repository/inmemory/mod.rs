//! InMemory 実装

mod chat_store;
mod connection;
mod room;

pub use chat_store::InMemoryChatStore;
pub use connection::InMemoryConnectionRepository;
pub use room::InMemoryRoomRepository;
