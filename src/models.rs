// src/models.rs

use serde::{Deserialize, Deserializer};

pub mod auth;
pub mod profile;
pub mod rbac;
pub mod settings;
pub mod tenancy;

// E-mails chegam com espaços nas pontas; o validator precisa ver o valor já aparado
pub(crate) fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|s| s.trim().to_string())
}

pub(crate) fn trimmed_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(|v| v.map(|s| s.trim().to_string()))
}
