//! Sqlite-backed persistence.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use audit_core::{Settings, Theme};
use rusqlite::{Connection, OptionalExtension as _};

mod gateway;

pub use gateway::{
    PersistError, SLOT_KEY, SnapshotGateway, export_file_name, export_to_file, import_from_file,
    parse_snapshot,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Durable key -> string slots.
pub trait KeyValueStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug)]
pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open sqlite db at {}", path.as_ref().display()))?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    fn migrate(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                theme TEXT NOT NULL,
                text_model TEXT NOT NULL,
                fallback_model TEXT NOT NULL,
                speech_model TEXT NOT NULL,
                voice TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (unixepoch())
            );
            "#,
        )?;

        let defaults = Settings::default();
        self.conn.execute(
            r#"
            INSERT OR IGNORE INTO settings (id, theme, text_model, fallback_model, speech_model, voice)
            VALUES (1, ?, ?, ?, ?, ?)
            "#,
            (
                defaults.theme.as_str(),
                &defaults.text_model,
                &defaults.fallback_model,
                &defaults.speech_model,
                &defaults.voice,
            ),
        )?;

        match self
            .conn
            .execute("ALTER TABLE settings ADD COLUMN export_dir TEXT", [])
        {
            Ok(_) => {}
            Err(err) => {
                let msg = err.to_string();
                if !msg.contains("duplicate column name") {
                    return Err(err).context("add settings.export_dir column");
                }
            }
        }

        Ok(())
    }

    pub fn load_settings(&self) -> anyhow::Result<Settings> {
        let row = self
            .conn
            .query_row(
                "SELECT theme, text_model, fallback_model, speech_model, voice, export_dir FROM settings WHERE id = 1",
                [],
                |row| {
                    let theme: String = row.get(0)?;
                    let text_model: String = row.get(1)?;
                    let fallback_model: String = row.get(2)?;
                    let speech_model: String = row.get(3)?;
                    let voice: String = row.get(4)?;
                    let export_dir: Option<String> = row.get(5)?;
                    Ok((theme, text_model, fallback_model, speech_model, voice, export_dir))
                },
            )
            .optional()?;

        let Some((theme, text_model, fallback_model, speech_model, voice, export_dir)) = row else {
            return Ok(Settings::default());
        };

        let mut settings = Settings {
            theme: theme.parse::<Theme>().unwrap_or(Theme::Dark),
            text_model,
            fallback_model,
            speech_model,
            voice,
            export_dir,
        };
        settings.normalize();
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        let mut settings = settings.clone();
        settings.normalize();

        self.conn.execute(
            "UPDATE settings SET theme = ?, text_model = ?, fallback_model = ?, speech_model = ?, voice = ?, export_dir = ? WHERE id = 1",
            (
                settings.theme.as_str(),
                &settings.text_model,
                &settings.fallback_model,
                &settings.speech_model,
                &settings.voice,
                &settings.export_dir,
            ),
        )?;
        Ok(())
    }
}

impl KeyValueStore for Storage {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM slots WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO slots (key, value, updated_at) VALUES (?, ?, unixepoch())
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            (key, value),
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM slots WHERE key = ?", [key])?;
        Ok(())
    }
}

/// Process-local store without durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .slots
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        store
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.slots.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.slots
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.slots.borrow_mut().remove(key);
        Ok(())
    }
}
