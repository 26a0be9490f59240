// src/services/session.rs
//
// Sessão sem estado: o cookie carrega `{uid, exp}` assinado com HMAC-SHA256.
// Não existe lista de revogação; logout apenas sobrescreve o cookie. Um token
// capturado continua válido até `exp`.

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::config::Settings;

type HmacSha256 = Hmac<Sha256>;

// Payload do token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub uid: String,
    pub exp: i64,
}

#[derive(Serialize)]
struct ClaimsOut<'a> {
    uid: &'a str,
    exp: i64,
}

#[derive(Clone)]
pub struct SessionCodec {
    secret: Arc<str>,
    ttl_secs: i64,
}

impl SessionCodec {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            secret: Arc::from(secret),
            ttl_secs,
        }
    }

    /// Token com o TTL padrão.
    pub fn mint(&self, user_id: Uuid) -> String {
        self.mint_at(&user_id.to_string(), self.ttl_secs, Utc::now().timestamp())
    }

    pub fn mint_at(&self, uid: &str, ttl_secs: i64, now: i64) -> String {
        let claims = ClaimsOut {
            uid,
            exp: now + ttl_secs,
        };
        // Serializar uma struct de &str + i64 não falha
        let json = serde_json::to_vec(&claims).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&payload));
        format!("{payload}.{signature}")
    }

    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Qualquer falha (formato, assinatura, JSON, tipos, expiração) vira `None`.
    pub fn verify_at(&self, token: &str, now: i64) -> Option<SessionClaims> {
        let (payload, signature) = token.split_once('.')?;
        if payload.is_empty() || signature.is_empty() {
            return None;
        }

        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        // Comparação em tempo constante
        mac.verify_slice(&signature).ok()?;

        let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;

        let uid = value.get("uid")?.as_str()?.to_string();
        let exp = value.get("exp")?.as_f64()?;
        if !exp.is_finite() || exp <= now as f64 {
            return None;
        }

        Some(SessionClaims {
            uid,
            exp: exp as i64,
        })
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    fn mac(&self) -> HmacSha256 {
        <HmacSha256 as Mac>::new_from_slice(self.secret.as_bytes())
            .expect("HMAC aceita chaves de qualquer tamanho")
    }
}

// ---
// Cookies de sessão
// ---

/// Nome primário + nomes de compatibilidade (ex.: `sid`) da migração de cookies.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    primary: String,
    compat: Vec<String>,
    mirror_compat: bool,
    max_age_secs: i64,
    same_site: SameSite,
    secure: bool,
    domain: Option<String>,
}

impl SessionCookies {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut names = settings.session_cookie_names().into_iter();
        let primary = names.next().unwrap_or_else(|| settings.session_cookie_name.clone());
        Self {
            primary,
            compat: names.collect(),
            mirror_compat: settings.mirror_compat_cookies,
            max_age_secs: settings.session_ttl_secs,
            same_site: settings.cookie_same_site,
            secure: settings.production,
            domain: settings.cookie_domain.clone(),
        }
    }

    /// Nomes lidos, na ordem de prioridade.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.compat.iter().map(String::as_str))
    }

    /// Valores não vazios presentes no jar, na ordem de prioridade.
    pub fn candidates(&self, jar: &CookieJar) -> Vec<String> {
        self.names()
            .filter_map(|name| jar.get(name))
            .map(|c| c.value().trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Grava o token no cookie primário e, se configurado, nos de compatibilidade.
    pub fn issue(&self, mut jar: CookieJar, token: &str) -> CookieJar {
        let max_age = cookie::time::Duration::seconds(self.max_age_secs);
        jar = jar.add(self.build(self.primary.clone(), token.to_string(), max_age, None));
        if self.mirror_compat {
            for name in &self.compat {
                jar = jar.add(self.build(name.clone(), token.to_string(), max_age, None));
            }
        }
        jar
    }

    /// Sobrescreve todos os nomes com valor vazio e expiração imediata.
    pub fn clear(&self, mut jar: CookieJar) -> CookieJar {
        for name in self.names() {
            jar = jar.add(self.build(
                name.to_string(),
                String::new(),
                cookie::time::Duration::ZERO,
                Some(cookie::time::OffsetDateTime::UNIX_EPOCH),
            ));
        }
        jar
    }

    fn build(
        &self,
        name: String,
        value: String,
        max_age: cookie::time::Duration,
        expires: Option<cookie::time::OffsetDateTime>,
    ) -> Cookie<'static> {
        // SameSite=None exige Secure nos navegadores
        let secure = self.secure || self.same_site == SameSite::None;

        let mut builder = Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(self.same_site)
            .secure(secure)
            .max_age(max_age);

        if let Some(expires) = expires {
            builder = builder.expires(expires);
        }
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const NOW: i64 = 1_760_000_000;

    fn codec() -> SessionCodec {
        SessionCodec::new("test-secret", 3600)
    }

    fn sign_raw(codec: &SessionCodec, json: &str) -> String {
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(codec.sign(&payload));
        format!("{payload}.{signature}")
    }

    fn cookies(pairs: &[(&str, &str)]) -> SessionCookies {
        let mut map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        map.insert("DATABASE_URL".into(), "postgres://x".into());
        let settings = Settings::from_lookup(|k| map.get(k).cloned()).unwrap();
        SessionCookies::from_settings(&settings)
    }

    #[test]
    fn minted_token_verifies_until_expiry() {
        let c = codec();
        let token = c.mint_at("user-1", 60, NOW);

        let claims = c.verify_at(&token, NOW + 59).expect("token válido");
        assert_eq!(claims.uid, "user-1");
        assert_eq!(claims.exp, NOW + 60);

        assert_eq!(c.verify_at(&token, NOW + 60), None);
    }

    #[test]
    fn tampered_payload_or_signature_is_rejected() {
        let c = codec();
        let token = c.mint_at("user-1", 60, NOW);
        let (payload, signature) = token.split_once('.').unwrap();

        let forged_payload = URL_SAFE_NO_PAD.encode(r#"{"uid":"admin","exp":9999999999}"#);
        assert_eq!(c.verify_at(&format!("{forged_payload}.{signature}"), NOW), None);

        let mut sig = signature.to_string();
        let last = sig.pop().unwrap();
        sig.push(if last == 'A' { 'B' } else { 'A' });
        assert_eq!(c.verify_at(&format!("{payload}.{sig}"), NOW), None);
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let token = SessionCodec::new("other-secret", 3600).mint_at("user-1", 60, NOW);
        assert_eq!(codec().verify_at(&token, NOW), None);
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let c = codec();
        for token in ["", "abc", ".", "abc.", ".abc", "a.b.c", "sess_123"] {
            assert_eq!(c.verify_at(token, NOW), None, "{token:?}");
        }
    }

    #[test]
    fn claim_types_are_checked() {
        let c = codec();
        let numeric_uid = sign_raw(&c, r#"{"uid":42,"exp":9999999999}"#);
        assert_eq!(c.verify_at(&numeric_uid, NOW), None);

        let string_exp = sign_raw(&c, r#"{"uid":"u","exp":"9999999999"}"#);
        assert_eq!(c.verify_at(&string_exp, NOW), None);

        let not_json = sign_raw(&c, "not json");
        assert_eq!(c.verify_at(&not_json, NOW), None);

        let ok = sign_raw(&c, r#"{"uid":"u","exp":9999999999}"#);
        assert!(c.verify_at(&ok, NOW).is_some());
    }

    #[test]
    fn issue_writes_primary_and_mirrors_compat_names() {
        let jar = cookies(&[]).issue(CookieJar::new(), "tok");
        let primary = jar.get("gb_session").expect("cookie primário");
        assert_eq!(primary.value(), "tok");
        assert_eq!(primary.http_only(), Some(true));
        assert_eq!(primary.path(), Some("/"));
        assert_eq!(primary.max_age(), Some(cookie::time::Duration::seconds(604_800)));
        assert_eq!(jar.get("sid").map(|c| c.value().to_string()), Some("tok".into()));
    }

    #[test]
    fn issue_without_mirroring_only_sets_primary() {
        let jar = cookies(&[("SESSION_MIRROR_COMPAT", "false")]).issue(CookieJar::new(), "tok");
        assert!(jar.get("gb_session").is_some());
        assert!(jar.get("sid").is_none());
    }

    #[test]
    fn clear_expires_every_name() {
        let jar = cookies(&[("SESSION_MIRROR_COMPAT", "false")]).clear(CookieJar::new());
        for name in ["gb_session", "sid"] {
            let c = jar.get(name).expect("cookie limpo");
            assert_eq!(c.value(), "");
            assert_eq!(c.max_age(), Some(cookie::time::Duration::ZERO));
        }
    }

    #[test]
    fn same_site_none_forces_secure() {
        let jar = cookies(&[("COOKIE_SAMESITE", "none")]).issue(CookieJar::new(), "tok");
        assert_eq!(jar.get("gb_session").and_then(|c| c.secure()), Some(true));

        let jar = cookies(&[]).issue(CookieJar::new(), "tok");
        assert_eq!(jar.get("gb_session").and_then(|c| c.secure()), Some(false));
    }

    #[test]
    fn candidates_follow_name_priority() {
        let c = cookies(&[]);
        let jar = CookieJar::new()
            .add(Cookie::new("sid", "legacy"))
            .add(Cookie::new("gb_session", "primary"));
        assert_eq!(c.candidates(&jar), vec!["primary".to_string(), "legacy".to_string()]);
    }
}
