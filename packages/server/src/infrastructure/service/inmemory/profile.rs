//! InMemory profile service
//!
//! 未登録のユーザーにはプレースホルダーのプロフィール（`user-xxxxxxxx`）を返します。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tayori_shared::time::Clock;
use tokio::sync::RwLock;

use crate::domain::{ProfileService, PublicProfile, ServiceError, Timestamp, UserId};

/// インメモリのプロフィールサービス
pub struct InMemoryProfileService {
    profiles: RwLock<HashMap<UserId, PublicProfile>>,
    last_seen: RwLock<HashMap<UserId, Timestamp>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryProfileService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
            last_seen: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub async fn upsert_profile(&self, profile: PublicProfile) {
        self.profiles.write().await.insert(profile.user_id, profile);
    }

    pub async fn last_seen(&self, user_id: &UserId) -> Option<Timestamp> {
        self.last_seen.read().await.get(user_id).copied()
    }
}

fn placeholder_profile(user_id: UserId) -> PublicProfile {
    let simple = user_id.as_uuid().simple().to_string();
    PublicProfile {
        user_id,
        username: format!("user-{}", &simple[..8]),
        avatar_url: None,
    }
}

#[async_trait]
impl ProfileService for InMemoryProfileService {
    async fn get_public_user_info(&self, user_id: &UserId) -> Result<PublicProfile, ServiceError> {
        let profiles = self.profiles.read().await;
        Ok(profiles
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| placeholder_profile(*user_id)))
    }

    async fn update_last_seen(&self, user_id: &UserId) -> Result<(), ServiceError> {
        let now = Timestamp::new(self.clock.now_millis());
        self.last_seen.write().await.insert(*user_id, now);
        Ok(())
    }
}
