// src/db/profile_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::profile::{Profile, ProfileUpsert},
};

const PROFILE_COLUMNS: &str = "user_id, title, first_name, last_name, birth_date, street, \
     postal_code, city, country, gender, avatar_url, updated_at";

#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    // Só o avatar, para o /me
    pub async fn avatar_of(&self, user_id: Uuid) -> Result<Option<String>, AppError> {
        let avatar = sqlx::query_scalar::<_, Option<String>>(
            "SELECT avatar_url FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(avatar.flatten())
    }

    pub async fn upsert<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        input: &ProfileUpsert,
    ) -> Result<Profile, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"
            INSERT INTO user_profiles
                (user_id, title, first_name, last_name, birth_date, street, postal_code, city, country, gender, avatar_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id)
            DO UPDATE SET
                title = EXCLUDED.title,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                birth_date = EXCLUDED.birth_date,
                street = EXCLUDED.street,
                postal_code = EXCLUDED.postal_code,
                city = EXCLUDED.city,
                country = EXCLUDED.country,
                gender = EXCLUDED.gender,
                avatar_url = EXCLUDED.avatar_url,
                updated_at = now()
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&input.title)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(input.birth_date)
        .bind(&input.street)
        .bind(&input.postal_code)
        .bind(&input.city)
        .bind(&input.country)
        .bind(input.gender.as_str())
        .bind(&input.avatar_url)
        .fetch_one(executor)
        .await?;
        Ok(profile)
    }
}
