//! Actor display names, cached through the shared TTL store.

use std::sync::Arc;

use drivewatch_core::TtlCacheStore;

use crate::{activity::ActorRef, collaborators::PersonDirectory};

pub const PERSON_NAME_TTL_MS: u64 = 6 * 60 * 60 * 1_000;
const PERSON_NAME_CACHE_PREFIX: &str = "person-name.";
const PERSON_SUFFIX: &str = " さん";

pub struct PersonNameResolver {
    directory: Arc<dyn PersonDirectory>,
    cache: Arc<TtlCacheStore>,
    now_unix_ms: u64,
}

impl PersonNameResolver {
    pub fn new(
        directory: Arc<dyn PersonDirectory>,
        cache: Arc<TtlCacheStore>,
        now_unix_ms: u64,
    ) -> Self {
        Self {
            directory,
            cache,
            now_unix_ms,
        }
    }

    /// Display name for a person resource, or the resource name itself when none is known.
    pub async fn person_name(&self, person_name: &str) -> String {
        let cache_key = format!("{PERSON_NAME_CACHE_PREFIX}{person_name}");
        match self.cache.get(&cache_key, self.now_unix_ms) {
            Ok(Some(cached)) => return cached,
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(person = %person_name, error = %error, "person name cache read failed");
            }
        }

        match self.directory.display_name(person_name).await {
            Ok(Some(name)) if !name.trim().is_empty() => {
                if let Err(error) =
                    self.cache
                        .put(&cache_key, &name, PERSON_NAME_TTL_MS, self.now_unix_ms)
                {
                    tracing::warn!(person = %person_name, error = %error, "person name cache write failed");
                }
                name
            }
            Ok(_) => person_name.to_string(),
            Err(error) => {
                tracing::warn!(person = %person_name, error = %error, "person lookup failed");
                person_name.to_string()
            }
        }
    }

    pub async fn actor_display(&self, actor: &ActorRef) -> String {
        match actor {
            ActorRef::KnownUser { person_name } | ActorRef::Impersonation { person_name } => {
                format!("{}{PERSON_SUFFIX}", self.person_name(person_name).await)
            }
            ActorRef::DeletedUser => "削除済みユーザー".to_string(),
            ActorRef::UnknownUser => "不明なユーザー".to_string(),
            ActorRef::Anonymous => "匿名ユーザー".to_string(),
            ActorRef::Administrator => "管理者".to_string(),
            ActorRef::System => "システム".to_string(),
            ActorRef::Unrecognized => "不明なアクター".to_string(),
        }
    }

    /// Comma separated actor list in the order the activity reports it.
    pub async fn actors_text(&self, actors: &[ActorRef]) -> String {
        let mut names = Vec::with_capacity(actors.len());
        for actor in actors {
            names.push(self.actor_display(actor).await);
        }
        names.join(", ")
    }
}
