//! Configuration validation functions.

use super::media::MediaProviderKind;
use super::Config;
use crate::protocol::room_codes::MIN_ROOM_CODE_LENGTH;
use std::path::Path;

/// Reject configurations the server cannot run with.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    let matchmaking = &config.matchmaking;
    if matchmaking.lock_attempts == 0 {
        anyhow::bail!("matchmaking.lock_attempts must be at least 1");
    }
    if matchmaking.lock_lease_ms == 0 {
        anyhow::bail!("matchmaking.lock_lease_ms must be greater than 0");
    }
    if matchmaking.room_code_length < MIN_ROOM_CODE_LENGTH {
        anyhow::bail!(
            "matchmaking.room_code_length must be at least {MIN_ROOM_CODE_LENGTH} (got {})",
            matchmaking.room_code_length
        );
    }
    let attempt_budget_ms = u64::from(matchmaking.lock_attempts)
        .saturating_mul(matchmaking.lock_retry_delay_ms);
    if attempt_budget_ms > matchmaking.lock_lease_ms.saturating_mul(10) {
        eprintln!(
            "WARNING: matchmaking lock retry budget ({attempt_budget_ms}ms) is far longer than \
             the lock lease ({}ms); joins may stall behind expired holders",
            matchmaking.lock_lease_ms
        );
    }

    if config.game.max_search_results == 0 {
        anyhow::bail!("game.max_search_results must be at least 1");
    }
    if let Some(seed) = &config.game.seed {
        if seed.key.trim().is_empty() || seed.label.trim().is_empty() {
            anyhow::bail!("game.seed.key and game.seed.label must not be empty");
        }
        if seed.credits.is_empty() {
            anyhow::bail!("game.seed.credits must contain at least one person id");
        }
    }

    if config.server.channel_capacity == 0 {
        anyhow::bail!("server.channel_capacity must be at least 1");
    }

    match config.media.provider {
        MediaProviderKind::Tmdb => {
            let token_present = config
                .media
                .tmdb_token
                .as_deref()
                .is_some_and(|token| !token.trim().is_empty());
            if !token_present {
                anyhow::bail!(
                    "media.tmdb_token is required when media.provider is \"tmdb\"\n\
                     export CASTLINK__MEDIA__TMDB_TOKEN=\"<TMDB read access token>\"\n\
                     or set media.provider to \"static\" with a media.catalog_path"
                );
            }
            url::Url::parse(&config.media.tmdb_base_url).map_err(|error| {
                anyhow::anyhow!(
                    "media.tmdb_base_url `{}` is not a valid url: {error}",
                    config.media.tmdb_base_url
                )
            })?;
        }
        MediaProviderKind::Static => {
            let path = config
                .media
                .catalog_path
                .as_deref()
                .map(str::trim)
                .filter(|path| !path.is_empty())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "media.catalog_path must be provided when media.provider is \"static\""
                    )
                })?;
            if !Path::new(path).exists() {
                anyhow::bail!("media catalog file not found at {path}");
            }
        }
    }

    Ok(())
}
