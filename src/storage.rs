// src/storage.rs
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CreatorProfile, SocialLink};
use crate::results::MergeCounts;

/// The enrichable fields on a creator profile. Keeping them a closed enum
/// makes the set-if-empty merge table auditable per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileField {
    AppleMusicId,
    AppleMusicUrl,
    DeezerId,
    TidalId,
    SoundcloudId,
    YoutubeMusicId,
    YoutubeMusicUrl,
    YoutubeUrl,
    Bio,
}

impl ProfileField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::AppleMusicId => "apple_music_id",
            ProfileField::AppleMusicUrl => "apple_music_url",
            ProfileField::DeezerId => "deezer_id",
            ProfileField::TidalId => "tidal_id",
            ProfileField::SoundcloudId => "soundcloud_id",
            ProfileField::YoutubeMusicId => "youtube_music_id",
            ProfileField::YoutubeMusicUrl => "youtube_music_url",
            ProfileField::YoutubeUrl => "youtube_url",
            ProfileField::Bio => "bio",
        }
    }
}

/// One computed field change, applied by the store as a partial update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub field: ProfileField,
    pub value: String,
}

/// Record-by-id storage access. The store is an external collaborator; it is
/// expected to support "update only these fields" semantics so one update
/// statement covers all computed changes.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, id: Uuid) -> Result<Option<CreatorProfile>>;

    /// Apply the given field updates to the record. Called at most once per
    /// job, and never with an empty update list.
    async fn update_profile_fields(&self, id: Uuid, updates: &[FieldUpdate]) -> Result<()>;
}

/// Ingestion collaborator for non-DSP social links. Normalization and
/// dedup of the links themselves happen on the other side of this trait.
#[async_trait]
pub trait SocialLinkSink: Send + Sync {
    async fn merge_links(&self, profile_id: Uuid, links: &[SocialLink]) -> Result<MergeCounts>;
}
