//! Finding the authority through the client configs it publishes

use std::collections::BTreeMap;
use std::sync::Arc;

use chatca_core::{
    run_bounded, ClientConfig, KvStore, MessagingChannel, CLIENT_CONFIG_KEY,
    CLIENT_CONFIG_NAMESPACE, MAX_CONCURRENT_OPS,
};
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::local_config::LocalConfig;

fn parse_entry(team: &str, value: &str) -> Result<Option<ClientConfig>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    let config = ClientConfig::from_json(value).map_err(|e| ClientError::InvalidConfig {
        team: team.to_string(),
        reason: e.to_string(),
    })?;
    if config.team_name.is_empty() || config.bot_name.is_empty() {
        return Err(ClientError::InvalidConfig {
            team: team.to_string(),
            reason: format!("missing team or bot name: {}", value),
        });
    }
    Ok(Some(config))
}

/// Read the client config stored in one team, if any
pub async fn load_team_config<K>(kv: &K, team: &str) -> Result<Option<ClientConfig>>
where
    K: KvStore + ?Sized,
{
    match kv.get(team, CLIENT_CONFIG_NAMESPACE, CLIENT_CONFIG_KEY).await {
        Ok(Some(value)) => parse_entry(team, &value),
        Ok(None) => Ok(None),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read the client config of every team the user can read.
///
/// Teams are scanned at most [`MAX_CONCURRENT_OPS`] at a time. The result is
/// deduplicated by bot name and sorted by it.
pub async fn load_configs<C>(channel: Arc<C>) -> Result<Vec<ClientConfig>>
where
    C: MessagingChannel + KvStore + 'static,
{
    let teams = channel.list_teams().await?;
    debug!(teams = teams.len(), "scanning teams for client configs");

    let results = run_bounded(teams, MAX_CONCURRENT_OPS, |team| {
        let channel = channel.clone();
        async move {
            channel
                .get(&team, CLIENT_CONFIG_NAMESPACE, CLIENT_CONFIG_KEY)
                .await
                .map(|value| (team, value))
        }
    })
    .await;

    let mut by_bot = BTreeMap::new();
    for result in results {
        let (team, value) = match result {
            Ok((team, Some(value))) => (team, value),
            Ok((_, None)) => continue,
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e.into()),
        };
        if let Some(config) = parse_entry(&team, &value)? {
            by_bot.insert(config.bot_name.clone(), config);
        }
    }
    Ok(by_bot.into_values().collect())
}

/// Find the config published by `bot`
pub async fn find_config_for_bot<C>(channel: Arc<C>, bot: &str) -> Result<ClientConfig>
where
    C: MessagingChannel + KvStore + 'static,
{
    load_configs(channel)
        .await?
        .into_iter()
        .find(|c| c.bot_name == bot)
        .ok_or_else(|| ClientError::BotNotFound {
            bot: bot.to_string(),
        })
}

/// Pick the authority to talk to.
///
/// An explicit bot wins, then the locally stored default bot, then the only
/// config found. Several configs without a default is an error naming them.
pub async fn select_config<C>(
    channel: Arc<C>,
    bot: Option<&str>,
    local: &LocalConfig,
) -> Result<ClientConfig>
where
    C: MessagingChannel + KvStore + 'static,
{
    if let Some(bot) = bot {
        return find_config_for_bot(channel, bot).await;
    }

    if let Some((bot, team)) = local.default_bot() {
        debug!(bot, team, "using default bot");
        return match load_team_config(channel.as_ref(), team).await? {
            Some(config) if config.bot_name == bot => Ok(config),
            _ => Err(ClientError::DefaultBotNotFound {
                bot: bot.to_string(),
                team: team.to_string(),
            }),
        };
    }

    let mut configs = load_configs(channel).await?;
    match configs.len() {
        0 => Err(ClientError::NoConfigs),
        1 => Ok(configs.remove(0)),
        count => Err(ClientError::AmbiguousBots {
            count,
            names: configs
                .iter()
                .map(|c| c.bot_name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatca_core::{MemoryChannel, MemoryHub, TeamRole};

    fn entry(team: &str, bot: &str) -> String {
        ClientConfig {
            team_name: team.to_string(),
            channel_name: String::new(),
            bot_name: bot.to_string(),
        }
        .to_json()
        .unwrap()
    }

    async fn user_in(hub: &MemoryHub, teams: &[(&str, Option<&str>)]) -> Arc<MemoryChannel> {
        let writer = hub.connect("cabot", "server");
        for (team, bot) in teams {
            hub.set_role(team, "alice", TeamRole::Writer);
            if let Some(bot) = bot {
                writer
                    .put(team, CLIENT_CONFIG_NAMESPACE, CLIENT_CONFIG_KEY, &entry(team, bot))
                    .await
                    .unwrap();
            }
        }
        Arc::new(hub.connect("alice", "laptop"))
    }

    #[tokio::test]
    async fn test_configs_deduplicated_by_bot() {
        let hub = MemoryHub::new();
        let alice = user_in(
            &hub,
            &[("a", Some("cabot")), ("b", Some("cabot")), ("c", Some("otherbot")), ("d", None)],
        )
        .await;

        let configs = load_configs(alice).await.unwrap();
        let bots: Vec<&str> = configs.iter().map(|c| c.bot_name.as_str()).collect();
        assert_eq!(bots, vec!["cabot", "otherbot"]);
    }

    #[tokio::test]
    async fn test_incomplete_config_is_an_error() {
        let hub = MemoryHub::new();
        let alice = user_in(&hub, &[("a", None)]).await;
        hub.connect("cabot", "server")
            .put("a", CLIENT_CONFIG_NAMESPACE, CLIENT_CONFIG_KEY, r#"{"teamname":"a"}"#)
            .await
            .unwrap();
        assert!(matches!(
            load_configs(alice).await,
            Err(ClientError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_selection_order() {
        let hub = MemoryHub::new();
        let alice = user_in(&hub, &[("a", Some("cabot")), ("b", Some("otherbot"))]).await;
        let none = LocalConfig::default();

        // Explicit bot
        let config = select_config(alice.clone(), Some("otherbot"), &none).await.unwrap();
        assert_eq!(config.team_name, "b");
        assert!(matches!(
            select_config(alice.clone(), Some("ghost"), &none).await,
            Err(ClientError::BotNotFound { .. })
        ));

        // Two bots and no default
        match select_config(alice.clone(), None, &none).await {
            Err(ClientError::AmbiguousBots { count, names }) => {
                assert_eq!(count, 2);
                assert_eq!(names, "cabot, otherbot");
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }

        // Default bot
        let local = LocalConfig {
            default_bot: "cabot".to_string(),
            default_team: "a".to_string(),
            ..Default::default()
        };
        let config = select_config(alice.clone(), None, &local).await.unwrap();
        assert_eq!(config.bot_name, "cabot");

        let stale = LocalConfig {
            default_bot: "cabot".to_string(),
            default_team: "b".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            select_config(alice, None, &stale).await,
            Err(ClientError::DefaultBotNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_single_config_and_none() {
        let hub = MemoryHub::new();
        let alice = user_in(&hub, &[("a", Some("cabot")), ("b", None)]).await;
        let config = select_config(alice, None, &LocalConfig::default()).await.unwrap();
        assert_eq!(config.bot_name, "cabot");

        let hub = MemoryHub::new();
        let bob = user_in(&hub, &[("a", None)]).await;
        assert!(matches!(
            select_config(bob, None, &LocalConfig::default()).await,
            Err(ClientError::NoConfigs)
        ));
    }
}
