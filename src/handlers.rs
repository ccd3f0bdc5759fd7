pub mod auth;
pub mod commissions;
pub mod contracts;
pub mod deals;
pub mod directory;
pub mod leads;
pub mod notifications;
pub mod phonebook;
pub mod targets;
pub mod whatsapp;
