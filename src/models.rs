pub mod activity;
pub mod auth;
pub mod client;
pub mod commission;
pub mod contract;
pub mod deal;
pub mod directory;
pub mod lead;
pub mod phonebook;
pub mod target;
pub mod whatsapp;
