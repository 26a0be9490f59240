// src/models/settings.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Chave da linha em `settings` que guarda o tema global.
pub const THEME_KEY: &str = "theme:global";

// Tokens do tema. Todos opcionais; quando presentes, não podem ser vazios.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ThemeVars {
    #[validate(custom(function = "not_blank"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "#0f766e")]
    pub brand: Option<String>,

    #[validate(custom(function = "not_blank"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_foreground: Option<String>,

    #[validate(custom(function = "not_blank"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg: Option<String>,

    #[validate(custom(function = "not_blank"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg: Option<String>,

    #[validate(custom(function = "not_blank"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,

    #[validate(custom(function = "not_blank"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_foreground: Option<String>,

    #[validate(custom(function = "not_blank"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<String>,

    #[validate(custom(function = "not_blank"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted_fg: Option<String>,

    #[validate(custom(function = "not_blank"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,

    #[validate(custom(function = "not_blank"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "Inter, sans-serif")]
    pub font_sans: Option<String>,

    #[validate(custom(function = "not_blank"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "0.5rem")]
    pub radius: Option<String>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("length");
        err.message = Some("Wert darf nicht leer sein.".into());
        return Err(err);
    }
    Ok(())
}

impl ThemeVars {
    /// Pares (variável CSS, valor) na ordem de emissão.
    fn tokens(&self) -> [(&'static str, Option<&str>); 11] {
        [
            ("brand", self.brand.as_deref()),
            ("brand-foreground", self.brand_foreground.as_deref()),
            ("bg", self.bg.as_deref()),
            ("fg", self.fg.as_deref()),
            ("card", self.card.as_deref()),
            ("card-foreground", self.card_foreground.as_deref()),
            ("muted", self.muted.as_deref()),
            ("muted-fg", self.muted_fg.as_deref()),
            ("border", self.border.as_deref()),
            ("font-sans", self.font_sans.as_deref()),
            ("radius", self.radius.as_deref()),
        ]
    }

    /// Remove espaços das pontas de cada valor.
    pub fn trimmed(self) -> Self {
        let t = |v: Option<String>| v.map(|s| s.trim().to_string());
        Self {
            brand: t(self.brand),
            brand_foreground: t(self.brand_foreground),
            bg: t(self.bg),
            fg: t(self.fg),
            card: t(self.card),
            card_foreground: t(self.card_foreground),
            muted: t(self.muted),
            muted_fg: t(self.muted_fg),
            border: t(self.border),
            font_sans: t(self.font_sans),
            radius: t(self.radius),
        }
    }

    /// Bloco `:root{...}` com as variáveis e os aliases usados pelos componentes.
    /// Tema vazio gera string vazia.
    pub fn css(&self) -> String {
        fn present(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }

        let mut parts: Vec<String> = self
            .tokens()
            .into_iter()
            .filter_map(|(name, value)| present(value).map(|v| format!("--{name}: {v};")))
            .collect();

        if let Some(v) = present(self.brand.as_deref()) {
            parts.push(format!("--primary: {v};"));
        }
        if let Some(v) = present(self.brand_foreground.as_deref()) {
            parts.push(format!("--primary-foreground: {v};"));
        }
        if let Some(v) = present(self.muted_fg.as_deref()) {
            parts.push(format!("--muted-foreground: {v};"));
        }

        if parts.is_empty() {
            String::new()
        } else {
            format!(":root{{{}}}", parts.concat())
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThemeResponse {
    pub value: ThemeVars,
    pub css: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThemeSaved {
    pub ok: bool,
    pub value: ThemeVars,
    pub css: String,
}
