// src/handlers.rs

pub mod account;
pub mod admins;
pub mod auth;
pub mod profile;
pub mod rbac;
pub mod settings;
