pub mod auth;
pub mod config;
pub mod conversation;
pub mod memory_writer;
pub mod note_update;
pub mod storage;
