pub mod health;
pub mod process;
pub mod root;
pub mod sessions;
pub mod whatsapp;
