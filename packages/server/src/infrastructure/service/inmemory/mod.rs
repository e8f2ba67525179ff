//! In-memory collaborator implementations.

mod chat;
mod profile;

pub use chat::InMemoryChatStore;
pub use profile::InMemoryProfileService;
