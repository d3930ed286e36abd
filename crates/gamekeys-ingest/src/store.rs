//! Postgres-backed catalog and settings stores.
//!
//! Queries are runtime strings mapped with `try_get`; the schema lives in
//! the embedded migrations under `migrations/`. Catalog-managed columns
//! (`is_featured`, `is_weekly_discount`, `is_bestseller`, `likes`,
//! `created_at`) are deliberately absent from the ingestion update
//! statement so re-ingestion cannot clobber them.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use gamekeys_core::{GameRecord, StoreSettings};

use crate::{CatalogStore, SettingsStore};

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("connecting to postgres")
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("running migrations")
}

#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const GAME_COLUMNS: &str = "id, title, image_url, background_image_url, original_price, \
     discount_price, discount_percentage, discount_end_date, full_description, \
     short_description, genres, release_date, release_year, platform_support, sku, \
     voice_ps5, voice_ps4, subtitles_ps5, subtitles_ps4, is_featured, \
     is_weekly_discount, is_bestseller, likes, categories, created_at, updated_at";

fn game_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<GameRecord> {
    Ok(GameRecord {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        image_url: row.try_get("image_url")?,
        background_image_url: row.try_get("background_image_url")?,
        original_price: row.try_get("original_price")?,
        discount_price: row.try_get("discount_price")?,
        discount_percentage: row.try_get("discount_percentage")?,
        discount_end_date: row.try_get("discount_end_date")?,
        full_description: row.try_get("full_description")?,
        short_description: row.try_get("short_description")?,
        genres: row.try_get("genres")?,
        release_date: row.try_get("release_date")?,
        release_year: row.try_get("release_year")?,
        platform_support: row.try_get("platform_support")?,
        sku: row.try_get("sku")?,
        voice_ps5: row.try_get("voice_ps5")?,
        voice_ps4: row.try_get("voice_ps4")?,
        subtitles_ps5: row.try_get("subtitles_ps5")?,
        subtitles_ps4: row.try_get("subtitles_ps4")?,
        is_featured: row.try_get("is_featured")?,
        is_weekly_discount: row.try_get("is_weekly_discount")?,
        is_bestseller: row.try_get("is_bestseller")?,
        likes: row.try_get("likes")?,
        categories: row.try_get("categories")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn find_by_sku(&self, sku: &str) -> anyhow::Result<Option<GameRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE sku = $1 AND sku <> '' LIMIT 1"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await
        .context("querying game by sku")?;
        row.as_ref().map(game_from_row).transpose()
    }

    async fn find_by_title_year(
        &self,
        title: &str,
        release_year: &str,
    ) -> anyhow::Result<Option<GameRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE title = $1 AND release_year = $2 LIMIT 1"
        ))
        .bind(title)
        .bind(release_year)
        .fetch_optional(&self.pool)
        .await
        .context("querying game by title and year")?;
        row.as_ref().map(game_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<GameRecord>> {
        let row = sqlx::query(&format!("SELECT {GAME_COLUMNS} FROM games WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("querying game by id")?;
        row.as_ref().map(game_from_row).transpose()
    }

    async fn insert(&self, record: &GameRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO games (id, title, image_url, background_image_url, original_price, \
             discount_price, discount_percentage, discount_end_date, full_description, \
             short_description, genres, release_date, release_year, platform_support, sku, \
             voice_ps5, voice_ps4, subtitles_ps5, subtitles_ps4, is_featured, \
             is_weekly_discount, is_bestseller, likes, categories, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)",
        )
        .bind(record.id)
        .bind(&record.title)
        .bind(&record.image_url)
        .bind(&record.background_image_url)
        .bind(record.original_price)
        .bind(record.discount_price)
        .bind(&record.discount_percentage)
        .bind(&record.discount_end_date)
        .bind(&record.full_description)
        .bind(&record.short_description)
        .bind(&record.genres)
        .bind(&record.release_date)
        .bind(&record.release_year)
        .bind(&record.platform_support)
        .bind(&record.sku)
        .bind(&record.voice_ps5)
        .bind(&record.voice_ps4)
        .bind(&record.subtitles_ps5)
        .bind(&record.subtitles_ps4)
        .bind(record.is_featured)
        .bind(record.is_weekly_discount)
        .bind(record.is_bestseller)
        .bind(record.likes)
        .bind(&record.categories)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .context("inserting game")?;
        Ok(())
    }

    async fn update(&self, record: &GameRecord) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE games SET title = $2, image_url = $3, background_image_url = $4, \
             original_price = $5, discount_price = $6, discount_percentage = $7, \
             discount_end_date = $8, full_description = $9, short_description = $10, \
             genres = $11, release_date = $12, release_year = $13, platform_support = $14, \
             sku = $15, voice_ps5 = $16, voice_ps4 = $17, subtitles_ps5 = $18, \
             subtitles_ps4 = $19, categories = $20, updated_at = $21 WHERE id = $1",
        )
        .bind(record.id)
        .bind(&record.title)
        .bind(&record.image_url)
        .bind(&record.background_image_url)
        .bind(record.original_price)
        .bind(record.discount_price)
        .bind(&record.discount_percentage)
        .bind(&record.discount_end_date)
        .bind(&record.full_description)
        .bind(&record.short_description)
        .bind(&record.genres)
        .bind(&record.release_date)
        .bind(&record.release_year)
        .bind(&record.platform_support)
        .bind(&record.sku)
        .bind(&record.voice_ps5)
        .bind(&record.voice_ps4)
        .bind(&record.subtitles_ps5)
        .bind(&record.subtitles_ps4)
        .bind(&record.categories)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .context("updating game")?;
        anyhow::ensure!(result.rows_affected() == 1, "game {} not found", record.id);
        Ok(())
    }

    async fn update_prices(
        &self,
        id: Uuid,
        discount_price: Option<f64>,
        discount_percentage: &str,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE games SET discount_price = $2, discount_percentage = $3, updated_at = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(discount_price)
        .bind(discount_percentage)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .context("updating game prices")?;
        anyhow::ensure!(result.rows_affected() == 1, "game {id} not found");
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn load(&self) -> anyhow::Result<Option<StoreSettings>> {
        let row = sqlx::query(
            "SELECT id, exchange_rate, markup_percent, last_updated FROM store_settings LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("querying store settings")?;
        row.map(|row| {
            Ok(StoreSettings {
                id: row.try_get("id")?,
                exchange_rate: row.try_get("exchange_rate")?,
                markup_percent: row.try_get("markup_percent")?,
                last_updated: row.try_get("last_updated")?,
            })
        })
        .transpose()
    }

    async fn insert(&self, settings: &StoreSettings) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO store_settings (id, exchange_rate, markup_percent, last_updated) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(settings.id)
        .bind(settings.exchange_rate)
        .bind(settings.markup_percent)
        .bind(settings.last_updated)
        .execute(&self.pool)
        .await
        .context("inserting store settings")?;
        Ok(())
    }

    async fn update(&self, settings: &StoreSettings) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE store_settings SET exchange_rate = $2, markup_percent = $3, \
             last_updated = $4 WHERE id = $1",
        )
        .bind(settings.id)
        .bind(settings.exchange_rate)
        .bind(settings.markup_percent)
        .bind(settings.last_updated)
        .execute(&self.pool)
        .await
        .context("updating store settings")?;
        anyhow::ensure!(result.rows_affected() == 1, "settings row not found");
        Ok(())
    }
}
