// src/services.rs

pub mod account_service;
pub mod auth;
pub mod mailer;
pub mod policy;
pub mod profile_service;
pub mod rbac_service;
pub mod session;
pub mod settings_service;
