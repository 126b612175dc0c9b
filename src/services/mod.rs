pub mod admin_service;
pub mod audit_service;
pub mod auth_service;
pub mod poll_service;
