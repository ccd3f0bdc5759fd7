pub mod auth;
pub mod commission_service;
pub mod contract_service;
pub mod deal_service;
pub mod journal;
pub mod lead_service;
pub mod notification_service;
pub mod phonebook_service;
pub mod scheduler;
pub mod stakeholders;
pub mod target_service;
pub mod whatsapp_service;
