// src/services/store.rs
use crate::errors::StyleSenseError;
use crate::models::{OutfitRecommendation, PersonalColorProfile, SavedOutfit};
use async_trait::async_trait;
use log::info;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const SAVED_OUTFITS_KEY: &str = "stylesense:saved_outfits";
pub const COLOR_PROFILE_KEY: &str = "stylesense:color_profile";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StyleSenseError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StyleSenseError>;
    async fn delete(&self, key: &str) -> Result<(), StyleSenseError>;
}

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StyleSenseError> {
        let client = redis::Client::open(redis_url)?;
        let mut conn = ConnectionManager::new(client).await?;

        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        info!("connected to redis");

        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StyleSenseError> {
        let mut conn = self.conn.clone();
        Ok(conn.get::<_, Option<String>>(key).await?)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StyleSenseError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StyleSenseError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

/// Process-local backend for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StyleSenseError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StyleSenseError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StyleSenseError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Typed access to the two persisted records: the saved-outfits
/// collection and the color profile.
#[derive(Clone)]
pub struct ProfileStore {
    kv: Arc<dyn KeyValueStore>,
}

impl ProfileStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn saved_outfits(&self) -> Result<Vec<SavedOutfit>, StyleSenseError> {
        match self.kv.get(SAVED_OUTFITS_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Saving an outfit that is already saved replaces the earlier entry.
    pub async fn save_outfit(
        &self,
        outfit: OutfitRecommendation,
    ) -> Result<Vec<SavedOutfit>, StyleSenseError> {
        if outfit.id.trim().is_empty() {
            return Err(StyleSenseError::Validation(
                "outfit id must not be empty".to_string(),
            ));
        }
        let mut saved = self.saved_outfits().await?;
        saved.retain(|s| s.outfit.id != outfit.id);
        saved.push(SavedOutfit {
            outfit,
            saved_at: chrono::Utc::now(),
        });
        self.kv
            .set(SAVED_OUTFITS_KEY, serde_json::to_string(&saved)?)
            .await?;
        Ok(saved)
    }

    pub async fn remove_outfit(&self, id: &str) -> Result<Vec<SavedOutfit>, StyleSenseError> {
        let mut saved = self.saved_outfits().await?;
        let before = saved.len();
        saved.retain(|s| s.outfit.id != id);
        if saved.len() == before {
            return Err(StyleSenseError::NotFound(format!("saved outfit {}", id)));
        }
        self.kv
            .set(SAVED_OUTFITS_KEY, serde_json::to_string(&saved)?)
            .await?;
        Ok(saved)
    }

    pub async fn color_profile(&self) -> Result<Option<PersonalColorProfile>, StyleSenseError> {
        match self.kv.get(COLOR_PROFILE_KEY).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_color_profile(
        &self,
        profile: &PersonalColorProfile,
    ) -> Result<(), StyleSenseError> {
        self.kv
            .set(COLOR_PROFILE_KEY, serde_json::to_string(profile)?)
            .await
    }

    pub async fn clear_color_profile(&self) -> Result<(), StyleSenseError> {
        self.kv.delete(COLOR_PROFILE_KEY).await
    }
}
