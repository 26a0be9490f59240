// src/models/profile.rs

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

static BIRTH_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("regex válida"));

static DATA_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^data:image/[a-z0-9.+-]+;base64,[a-z0-9+/=]+$").expect("regex válida")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Diverse,
    #[default]
    Unspecified,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Diverse => "diverse",
            Gender::Unspecified => "unspecified",
        }
    }
}

// Linha da tabela user_profiles
#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub title: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub gender: String,
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Campos obrigatórios para o perfil contar como completo, na ordem reportada.
pub fn missing_fields(profile: Option<&Profile>) -> Vec<&'static str> {
    let filled = |v: Option<&Option<String>>| {
        v.and_then(|o| o.as_deref())
            .is_some_and(|s| !s.trim().is_empty())
    };

    [
        ("firstName", profile.map(|p| &p.first_name)),
        ("lastName", profile.map(|p| &p.last_name)),
        ("street", profile.map(|p| &p.street)),
        ("postalCode", profile.map(|p| &p.postal_code)),
        ("city", profile.map(|p| &p.city)),
        ("country", profile.map(|p| &p.country)),
    ]
    .into_iter()
    .filter(|(_, value)| !filled(*value))
    .map(|(name, _)| name)
    .collect()
}

// Perfil como o cliente o vê (avatar sempre preenchido)
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    pub avatar_url: String,
}

impl ProfileView {
    pub fn from_row(row: Option<Profile>, default_avatar: String) -> Self {
        match row {
            None => Self {
                avatar_url: default_avatar,
                ..Default::default()
            },
            Some(p) => Self {
                title: p.title,
                first_name: p.first_name,
                last_name: p.last_name,
                birth_date: p.birth_date,
                street: p.street,
                postal_code: p.postal_code,
                city: p.city,
                country: p.country,
                gender: Some(p.gender),
                avatar_url: p.avatar_url.filter(|a| !a.is_empty()).unwrap_or(default_avatar),
            },
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfilePayload {
    #[validate(length(max = 64, message = "Titel zu lang."))]
    pub title: Option<String>,

    #[validate(custom(function = "not_blank", message = "Vorname erforderlich."))]
    pub first_name: String,

    #[validate(custom(function = "not_blank", message = "Nachname erforderlich."))]
    pub last_name: String,

    #[validate(regex(path = *BIRTH_DATE_RE, message = "Geburtsdatum im Format JJJJ-MM-TT."))]
    #[schema(example = "1990-04-17")]
    pub birth_date: String,

    #[validate(custom(function = "not_blank", message = "Straße erforderlich."))]
    pub street: String,

    #[validate(custom(function = "not_blank", message = "PLZ erforderlich."))]
    pub postal_code: String,

    #[validate(custom(function = "not_blank", message = "Ort erforderlich."))]
    pub city: String,

    #[validate(custom(function = "country_code", message = "Ländercode mit 2 Buchstaben."))]
    #[schema(example = "DE")]
    pub country: String,

    pub gender: Option<Gender>,

    /// http(s)-URL ou `data:image/...;base64,`; vazio = avatar padrão.
    #[validate(custom(function = "validate_avatar_url"))]
    pub avatar_url: Option<String>,

    // Aceito e ignorado
    #[validate(length(max = 32))]
    pub locale: Option<String>,
}

impl ProfilePayload {
    /// Data já validada pelo regex; datas impossíveis (2023-02-30) caem aqui.
    pub fn parsed_birth_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.birth_date, "%Y-%m-%d").ok()
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar_url
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }
}

// Valores já normalizados, prontos para o upsert
#[derive(Debug, Clone)]
pub struct ProfileUpsert {
    pub title: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub gender: Gender,
    pub avatar_url: String,
}

impl ProfileUpsert {
    /// `None` quando a data passa no formato mas não existe no calendário.
    pub fn from_payload(payload: &ProfilePayload, default_avatar: &str) -> Option<Self> {
        let trimmed = |s: &str| s.trim().to_string();
        Some(Self {
            title: payload
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            first_name: trimmed(&payload.first_name),
            last_name: trimmed(&payload.last_name),
            birth_date: payload.parsed_birth_date()?,
            street: trimmed(&payload.street),
            postal_code: trimmed(&payload.postal_code),
            city: trimmed(&payload.city),
            country: payload.country.trim().to_uppercase(),
            gender: payload.gender.unwrap_or_default(),
            avatar_url: payload.avatar().unwrap_or(default_avatar).to_string(),
        })
    }
}

// Obrigatórios: só espaços contam como vazio
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

fn country_code(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.len() == 2 && value.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(ValidationError::new("country"))
    }
}

fn validate_avatar_url(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    let lower = value.to_ascii_lowercase();
    if value.is_empty()
        || lower.starts_with("http://")
        || lower.starts_with("https://")
        || DATA_IMAGE_RE.is_match(value)
    {
        Ok(())
    } else {
        let mut err = ValidationError::new("avatar_url");
        err.message = Some("avatarUrl muss http(s) oder data:image;base64 sein.".into());
        Err(err)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileStatus {
    pub completed: bool,
    pub missing: Vec<&'static str>,
}

impl ProfileStatus {
    pub fn of(profile: Option<&Profile>) -> Self {
        let missing = missing_fields(profile);
        Self {
            completed: missing.is_empty(),
            missing,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileSaved {
    pub ok: bool,
    pub completed: bool,
    pub missing: Vec<&'static str>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub profile: ProfileView,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ProfilePayload {
        ProfilePayload {
            title: None,
            first_name: "Anna".into(),
            last_name: "Schmidt".into(),
            birth_date: "1990-04-17".into(),
            street: "Hauptstraße 1".into(),
            postal_code: "10115".into(),
            city: "Berlin".into(),
            country: "de".into(),
            gender: None,
            avatar_url: None,
            locale: Some("de-DE".into()),
        }
    }

    fn row() -> Profile {
        Profile {
            user_id: Uuid::new_v4(),
            title: None,
            first_name: Some("Anna".into()),
            last_name: Some("Schmidt".into()),
            birth_date: None,
            street: Some("Hauptstraße 1".into()),
            postal_code: Some("10115".into()),
            city: Some("Berlin".into()),
            country: Some("DE".into()),
            gender: "unspecified".into(),
            avatar_url: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn valid_payload_passes() {
        assert!(payload().validate().is_ok());
    }

    #[test]
    fn birth_date_must_be_iso() {
        let mut p = payload();
        p.birth_date = "17.04.1990".into();
        assert!(p.validate().unwrap_err().field_errors().contains_key("birth_date"));

        p.birth_date = "2023-02-30".into();
        assert!(p.validate().is_ok());
        assert_eq!(p.parsed_birth_date(), None);
    }

    #[test]
    fn country_needs_two_letters() {
        let mut p = payload();
        p.country = "DEU".into();
        assert!(p.validate().unwrap_err().field_errors().contains_key("country"));
    }

    #[test]
    fn whitespace_only_required_fields_are_rejected() {
        let mut p = payload();
        p.first_name = "   ".into();
        p.city = "\t".into();
        let errors = p.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("first_name"));
        assert!(fields.contains_key("city"));

        let mut p = payload();
        p.country = "  ".into();
        assert!(p.validate().unwrap_err().field_errors().contains_key("country"));

        let mut p = payload();
        p.country = " at ".into();
        assert!(p.validate().is_ok());
    }

    #[test]
    fn avatar_accepts_urls_data_images_and_empty() {
        for ok in [
            "https://cdn.example.de/a.png",
            "HTTP://example.de/x.jpg",
            "data:image/png;base64,iVBORw0KGgo=",
            "",
        ] {
            let mut p = payload();
            p.avatar_url = Some(ok.into());
            assert!(p.validate().is_ok(), "{ok} deveria ser aceito");
        }

        for bad in ["ftp://example.de/a.png", "data:text/html;base64,PGh0bWw+", "javascript:alert(1)"] {
            let mut p = payload();
            p.avatar_url = Some(bad.into());
            assert!(p.validate().is_err(), "{bad} deveria ser rejeitado");
        }
    }

    #[test]
    fn empty_avatar_counts_as_absent() {
        let mut p = payload();
        p.avatar_url = Some("   ".into());
        assert_eq!(p.avatar(), None);
    }

    #[test]
    fn upsert_normalizes_payload() {
        let mut p = payload();
        p.first_name = "  Anna ".into();
        p.title = Some("   ".into());
        let upsert = ProfileUpsert::from_payload(&p, "https://app/avatar.png").unwrap();
        assert_eq!(upsert.first_name, "Anna");
        assert_eq!(upsert.title, None);
        assert_eq!(upsert.country, "DE");
        assert_eq!(upsert.gender, Gender::Unspecified);
        assert_eq!(upsert.avatar_url, "https://app/avatar.png");

        p.birth_date = "2023-02-30".into();
        assert!(ProfileUpsert::from_payload(&p, "x").is_none());
    }

    #[test]
    fn missing_fields_in_fixed_order() {
        assert_eq!(
            missing_fields(None),
            vec!["firstName", "lastName", "street", "postalCode", "city", "country"]
        );

        let mut partial = row();
        partial.city = Some("  ".into());
        partial.last_name = None;
        assert_eq!(missing_fields(Some(&partial)), vec!["lastName", "city"]);

        let status = ProfileStatus::of(Some(&row()));
        assert!(status.completed);
        assert!(status.missing.is_empty());
    }

    #[test]
    fn view_always_has_avatar() {
        let view = ProfileView::from_row(None, "https://app/avatar.png".into());
        assert_eq!(view.avatar_url, "https://app/avatar.png");
        assert!(view.first_name.is_none());

        let mut r = row();
        r.avatar_url = Some("https://cdn/me.png".into());
        let view = ProfileView::from_row(Some(r), "https://app/avatar.png".into());
        assert_eq!(view.avatar_url, "https://cdn/me.png");
    }
}
