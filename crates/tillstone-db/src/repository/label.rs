//! # Label Repository
//!
//! UI languages and their label texts.
//!
//! ```text
//! load_set("fr")
//!   labels(fr) ─┐
//!               ├─► LabelSet::get(key): fr → en → key
//!   labels(en) ─┘
//! ```
//!
//! Built-in dictionaries are seeded with `INSERT OR IGNORE`, so texts
//! edited in the database survive re-seeding.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{on_duplicate, DbError, DbResult};
use tillstone_core::labels::{builtin_labels, builtin_languages};
use tillstone_core::validation::{validate_language_code, validate_name};
use tillstone_core::{Label, LabelSet, Language, ValidationError, DEFAULT_LANGUAGE};

#[derive(Debug, Clone)]
pub struct LabelRepository {
    pool: SqlitePool,
}

impl LabelRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LabelRepository { pool }
    }

    pub async fn languages(&self) -> DbResult<Vec<Language>> {
        let languages = sqlx::query_as::<_, Language>("SELECT * FROM languages ORDER BY code")
            .fetch_all(&self.pool)
            .await?;
        Ok(languages)
    }

    pub async fn add_language(&self, code: &str, name: &str) -> DbResult<Language> {
        let code = code.trim().to_lowercase();
        validate_language_code(&code)?;
        validate_name("name", name, 50)?;

        let language = Language {
            code,
            name: name.trim().to_string(),
            is_default: false,
        };

        debug!(code = %language.code, "Adding language");

        sqlx::query("INSERT INTO languages (code, name, is_default) VALUES (?1, ?2, 0)")
            .bind(&language.code)
            .bind(&language.name)
            .execute(&self.pool)
            .await
            .map_err(on_duplicate("language", &language.code))?;

        Ok(language)
    }

    /// Language the UI opens in, if one is marked.
    pub async fn default_language(&self) -> DbResult<Option<Language>> {
        let language = sqlx::query_as::<_, Language>("SELECT * FROM languages WHERE is_default = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(language)
    }

    /// Marks `code` as the only default language.
    pub async fn set_default_language(&self, code: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE languages SET is_default = 0 WHERE is_default = 1")
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("UPDATE languages SET is_default = 1 WHERE code = ?1")
            .bind(code)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Language", code));
        }

        tx.commit().await?;
        info!(code, "Default language changed");
        Ok(())
    }

    pub async fn labels(&self, code: &str) -> DbResult<Vec<Label>> {
        let labels = sqlx::query_as::<_, Label>(
            "SELECT * FROM labels WHERE language_code = ?1 ORDER BY key",
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?;
        Ok(labels)
    }

    /// Inserts or replaces one label text.
    pub async fn upsert_label(&self, code: &str, key: &str, text: &str) -> DbResult<Label> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ValidationError::required("key").into());
        }

        let exists: Option<String> = sqlx::query_scalar("SELECT code FROM languages WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Language", code));
        }

        debug!(code, key, "Saving label");

        sqlx::query(
            r#"
            INSERT INTO labels (language_code, key, text) VALUES (?1, ?2, ?3)
            ON CONFLICT (language_code, key) DO UPDATE SET text = excluded.text
            "#,
        )
        .bind(code)
        .bind(key)
        .bind(text)
        .execute(&self.pool)
        .await?;

        Ok(Label {
            language_code: code.to_string(),
            key: key.to_string(),
            text: text.to_string(),
        })
    }

    /// Labels of `code` backed by the default dictionary.
    pub async fn load_set(&self, code: &str) -> DbResult<LabelSet> {
        let pairs = |labels: Vec<Label>| labels.into_iter().map(|l| (l.key, l.text)).collect::<Vec<_>>();

        let labels = pairs(self.labels(code).await?);
        let fallback = if code == DEFAULT_LANGUAGE {
            Vec::new()
        } else {
            pairs(self.labels(DEFAULT_LANGUAGE).await?)
        };
        Ok(LabelSet::new(code, labels, fallback))
    }

    /// Inserts missing built-in languages and labels. Returns the number of
    /// rows added.
    pub async fn seed_builtin(&self) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;

        let has_default: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM languages WHERE is_default = 1)")
            .fetch_one(&mut *tx)
            .await?;

        let mut added = 0;
        for (code, name) in builtin_languages() {
            let is_default = !has_default && *code == DEFAULT_LANGUAGE;
            added += sqlx::query("INSERT OR IGNORE INTO languages (code, name, is_default) VALUES (?1, ?2, ?3)")
                .bind(code)
                .bind(name)
                .bind(is_default)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            for (key, text) in builtin_labels(code) {
                added += sqlx::query("INSERT OR IGNORE INTO labels (language_code, key, text) VALUES (?1, ?2, ?3)")
                    .bind(code)
                    .bind(key)
                    .bind(text)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
            }
        }

        tx.commit().await?;
        info!(added, "Built-in labels seeded");
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::test_db;

    #[tokio::test]
    async fn test_seed_is_idempotent_and_keeps_edits() {
        let db = test_db().await;
        let repo = db.labels();

        let first = repo.seed_builtin().await.unwrap();
        assert!(first > 0);

        repo.upsert_label("es", "menu.sales", "Ventas del día").await.unwrap();
        assert_eq!(repo.seed_builtin().await.unwrap(), 0);

        let set = repo.load_set("es").await.unwrap();
        assert_eq!(set.get("menu.sales"), "Ventas del día");
        assert_eq!(repo.default_language().await.unwrap().unwrap().code, "en");
    }

    #[tokio::test]
    async fn test_missing_label_falls_back_to_english_then_key() {
        let db = test_db().await;
        let repo = db.labels();
        repo.seed_builtin().await.unwrap();
        repo.add_language("de", "Deutsch").await.unwrap();
        repo.upsert_label("de", "menu.products", "Produkte").await.unwrap();

        let set = repo.load_set("de").await.unwrap();
        assert_eq!(set.get("menu.products"), "Produkte");
        assert_eq!(set.get("menu.sales"), "Sales");
        assert_eq!(set.get("no.such.key"), "no.such.key");
    }

    #[tokio::test]
    async fn test_single_default_language() {
        let db = test_db().await;
        let repo = db.labels();
        repo.seed_builtin().await.unwrap();

        repo.set_default_language("fr").await.unwrap();
        let defaults: Vec<_> = repo.languages().await.unwrap().into_iter().filter(|l| l.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].code, "fr");

        assert!(repo.set_default_language("xx").await.is_err());
        // Failed change rolled back
        assert_eq!(repo.default_language().await.unwrap().unwrap().code, "fr");
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_language() {
        let db = test_db().await;
        let repo = db.labels();
        repo.add_language("it", "Italiano").await.unwrap();
        assert!(repo.add_language("it", "Italiano").await.is_err());
        assert!(repo.add_language("ita", "Italiano").await.is_err());
        assert!(repo.upsert_label("pt", "menu.sales", "Vendas").await.is_err());
    }
}
