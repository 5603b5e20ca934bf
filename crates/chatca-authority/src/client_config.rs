//! Publishing client configuration into team key-value stores

use std::sync::Arc;

use chatca_core::config::CaConfig;
use chatca_core::{
    run_bounded, ClientConfig, KvStore, MessagingChannel, CLIENT_CONFIG_KEY,
    CLIENT_CONFIG_NAMESPACE, MAX_CONCURRENT_OPS,
};
use tracing::{debug, info};

use crate::error::{AuthorityError, Result};

/// The client configuration to store in each team.
///
/// With a fixed chat channel every entry points at it; otherwise each entry
/// points at the team it is stored in.
pub fn client_configs(config: &CaConfig, bot_name: &str) -> Vec<(String, ClientConfig)> {
    config
        .client_config_teams()
        .into_iter()
        .map(|team| {
            let entry = match config.chat_target() {
                Some((chat_team, chat_channel)) => ClientConfig {
                    team_name: chat_team.to_string(),
                    channel_name: chat_channel.to_string(),
                    bot_name: bot_name.to_string(),
                },
                None => ClientConfig {
                    team_name: team.clone(),
                    channel_name: String::new(),
                    bot_name: bot_name.to_string(),
                },
            };
            (team, entry)
        })
        .collect()
}

/// Write every entry, at most [`MAX_CONCURRENT_OPS`] at a time
pub async fn publish_client_configs<K>(kv: Arc<K>, entries: Vec<(String, ClientConfig)>) -> Result<()>
where
    K: KvStore + ?Sized + 'static,
{
    let mut jobs = Vec::with_capacity(entries.len());
    for (team, entry) in entries {
        jobs.push((team, entry.to_json()?));
    }

    let results = run_bounded(jobs, MAX_CONCURRENT_OPS, |(team, value)| {
        let kv = kv.clone();
        async move {
            debug!(team = %team, "writing client config");
            kv.put(&team, CLIENT_CONFIG_NAMESPACE, CLIENT_CONFIG_KEY, &value)
                .await
        }
    })
    .await;

    results.into_iter().collect::<std::result::Result<Vec<()>, _>>()?;
    Ok(())
}

/// Delete the entry from every team, returning the teams that had one.
///
/// Missing entries are not an error.
pub async fn delete_client_configs<K>(kv: Arc<K>, teams: Vec<String>) -> Result<Vec<String>>
where
    K: KvStore + ?Sized + 'static,
{
    let results = run_bounded(teams, MAX_CONCURRENT_OPS, |team| {
        let kv = kv.clone();
        async move {
            match kv
                .delete(&team, CLIENT_CONFIG_NAMESPACE, CLIENT_CONFIG_KEY)
                .await
            {
                Ok(()) => Ok(Some(team)),
                Err(e) if e.is_not_found() => {
                    debug!(team = %team, "no client config to delete");
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        }
    })
    .await;

    let mut found = Vec::new();
    for result in results {
        if let Some(team) = result? {
            found.push(team);
        }
    }
    info!(teams = ?found, "deleted client configs");
    Ok(found)
}

/// Delete client configuration from every team the identity belongs to
pub async fn wipe_all_client_configs<C>(channel: Arc<C>) -> Result<Vec<String>>
where
    C: MessagingChannel + KvStore + 'static,
{
    let teams = channel.list_teams().await?;
    delete_client_configs(channel, teams).await
}

/// Make sure the fixed chat channel exists and the identity has joined it
pub async fn ensure_chat_channel<C>(channel: &C, team: &str, name: &str) -> Result<()>
where
    C: MessagingChannel + ?Sized,
{
    let channels = channel.list_channels(team).await?;
    if !channels.iter().any(|c| c == name) {
        return Err(AuthorityError::ChannelNotFound {
            team: team.to_string(),
            channel: name.to_string(),
        });
    }
    channel.join_channel(team, name).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatca_core::{MemoryHub, TeamRole};

    fn config(chat_channel: Option<&str>) -> CaConfig {
        CaConfig {
            teams: vec!["infra.ssh".to_string(), "infra.ssh.prod".to_string()],
            chat_channel: chat_channel.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_configs_point_at_own_team_without_chat_channel() {
        let entries = client_configs(&config(None), "cabot");
        assert_eq!(entries.len(), 2);
        for (team, entry) in &entries {
            assert_eq!(&entry.team_name, team);
            assert_eq!(entry.channel_name, "");
            assert_eq!(entry.bot_name, "cabot");
        }
    }

    #[test]
    fn test_configs_point_at_chat_channel() {
        let entries = client_configs(&config(Some("ops#ssh")), "cabot");
        let teams: Vec<&str> = entries.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(teams, vec!["infra.ssh", "infra.ssh.prod", "ops"]);
        for (_, entry) in &entries {
            assert_eq!(entry.team_name, "ops");
            assert_eq!(entry.channel_name, "ssh");
        }
    }

    #[tokio::test]
    async fn test_publish_and_delete() {
        let hub = MemoryHub::new();
        let bot = Arc::new(hub.connect("cabot", "server"));

        publish_client_configs(bot.clone(), client_configs(&config(None), "cabot"))
            .await
            .unwrap();
        let stored = hub
            .kv_entry("infra.ssh", CLIENT_CONFIG_NAMESPACE, CLIENT_CONFIG_KEY)
            .unwrap();
        assert_eq!(ClientConfig::from_json(&stored).unwrap().team_name, "infra.ssh");

        let found = delete_client_configs(
            bot.clone(),
            vec!["infra.ssh".to_string(), "infra.ssh.prod".to_string(), "other".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(found, vec!["infra.ssh", "infra.ssh.prod"]);
        assert!(hub
            .kv_entry("infra.ssh", CLIENT_CONFIG_NAMESPACE, CLIENT_CONFIG_KEY)
            .is_none());
    }

    #[tokio::test]
    async fn test_wipe_covers_every_member_team() {
        let hub = MemoryHub::new();
        hub.set_role("a", "cabot", TeamRole::Writer);
        hub.set_role("b", "cabot", TeamRole::Writer);
        let bot = Arc::new(hub.connect("cabot", "server"));
        bot.put("a", CLIENT_CONFIG_NAMESPACE, CLIENT_CONFIG_KEY, "{}")
            .await
            .unwrap();

        let found = wipe_all_client_configs(bot).await.unwrap();
        assert_eq!(found, vec!["a"]);
    }

    #[tokio::test]
    async fn test_ensure_chat_channel() {
        let hub = MemoryHub::new();
        hub.add_channel("ops", "ssh");
        let bot = hub.connect("cabot", "server");

        ensure_chat_channel(&bot, "ops", "ssh").await.unwrap();
        assert_eq!(hub.joined_channels(), vec![("ops".to_string(), "ssh".to_string())]);

        assert!(matches!(
            ensure_chat_channel(&bot, "ops", "missing").await,
            Err(AuthorityError::ChannelNotFound { .. })
        ));
    }
}
