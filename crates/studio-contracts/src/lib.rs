pub mod chat;
pub mod events;
pub mod history;
pub mod image_data;
pub mod models;
pub mod prompts;
pub mod storage;
