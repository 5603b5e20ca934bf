//! chatssh flows

use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use tracing::{debug, info};

use chatca_client::ssh::{add_key_to_agent, run_ssh, ssh_arguments, write_default_user_config};
use chatca_client::{
    find_config_for_bot, has_usable_certificate, provision_new_key, select_config, LocalConfig,
    LocalConfigStore, Requester, SshPaths,
};
use chatca_keybase::{KeybaseChannel, KeybaseOptions};
use chatca_signing::SshKeygen;

use super::args::{Action, ChatsshArgs};

/// Run chatssh, returning the process exit code
pub fn execute(args: ChatsshArgs) -> anyhow::Result<i32> {
    let paths = SshPaths::from_home()?;
    let store = LocalConfigStore::in_ssh_dir(paths.dir());
    let rt = tokio::runtime::Runtime::new()?;

    match args.action() {
        Action::SetDefaultBot(bot) => {
            let local = store.load()?;
            let config = rt.block_on(async {
                let channel = Arc::new(connect(&local).await?);
                anyhow::Ok(find_config_for_bot(channel, &bot).await?)
            })?;
            store.set_default_bot(&config.bot_name, &config.team_name)?;
            println!(
                "{} Default bot set to {} (team {})",
                style("✓").green().bold(),
                config.bot_name,
                config.team_name
            );
        }
        Action::ClearDefaultBot => {
            store.clear_default_bot()?;
            println!("{} Cleared default bot", style("✓").green().bold());
        }
        Action::SetDefaultUser(user) => {
            store.set_default_user(&user)?;
            println!("{} Default ssh user set to {}", style("✓").green().bold(), user);
        }
        Action::ClearDefaultUser => {
            store.set_default_user("")?;
            let generated = paths.default_user_config();
            if generated.exists() {
                std::fs::remove_file(&generated)?;
            }
            println!("{} Cleared default ssh user", style("✓").green().bold());
        }
        Action::SetKeybaseBinary(path) => {
            store.set_keybase_binary(&path)?;
            println!("{} Using keybase binary {}", style("✓").green().bold(), path);
        }
        Action::Provision => {
            let local = store.load()?;
            let key_path = rt.block_on(obtain_certificate(&args, &paths, &local))?;
            rt.block_on(add_key_to_agent(&key_path))?;
            if let Some(user) = local.default_user() {
                write_default_user_config(&paths, user, &key_path)?;
            }
            println!("Provisioned new SSH key at {}", style(key_path.display()).cyan());
            if local.default_user().is_some() {
                println!(
                    "Tools that shell out to ssh (scp, rsync, git) pick up the default user with -F {}",
                    paths.default_user_config().display()
                );
            }
        }
        Action::Ssh => {
            let local = store.load()?;
            let key_path = rt.block_on(obtain_certificate(&args, &paths, &local))?;
            let config_file = match local.default_user() {
                Some(user) => Some(write_default_user_config(&paths, user, &key_path)?),
                None => None,
            };

            let ssh_args = ssh_arguments(&key_path, config_file.as_deref(), &args.ssh_args);
            let status = rt.block_on(async {
                add_key_to_agent(&key_path).await?;
                run_ssh(&ssh_args).await
            })?;
            debug!(?status, "ssh exited");
            return Ok(status.code().unwrap_or(crate::exit_codes::ERROR));
        }
    }

    Ok(crate::exit_codes::SUCCESS)
}

async fn connect(local: &LocalConfig) -> anyhow::Result<KeybaseChannel> {
    let options = KeybaseOptions {
        binary: local.keybase_binary().map(str::to_string),
        ..KeybaseOptions::default()
    };
    Ok(KeybaseChannel::connect(&options).await?)
}

/// Reuse a valid certificate or fetch a new one, returning the key path
async fn obtain_certificate(
    args: &ChatsshArgs,
    paths: &SshPaths,
    local: &LocalConfig,
) -> anyhow::Result<PathBuf> {
    paths.ensure_dir()?;

    let principal = args.request_principal.as_deref().unwrap_or_default();
    let known_bot = args
        .bot
        .as_deref()
        .or_else(|| local.default_bot().map(|(bot, _)| bot));
    if let Some(bot) = known_bot {
        let key_path = paths.signed_key(bot);
        if has_usable_certificate(&key_path, principal) {
            return Ok(key_path);
        }
    }

    let channel = Arc::new(connect(local).await?);
    let config = select_config(channel.clone(), args.bot.as_deref(), local).await?;
    let key_path = paths.signed_key(&config.bot_name);
    if known_bot.is_none() && has_usable_certificate(&key_path, principal) {
        return Ok(key_path);
    }

    info!(bot = %config.bot_name, team = %config.team_name, "requesting a new certificate");
    let requester = Requester::new(channel, config).with_progress(console::user_attended_stderr());
    provision_new_key(&requester, &SshKeygen::new(), &key_path, principal)
        .await
        .map_err(|e| anyhow::Error::new(e).context("failed to get a signed key from the CA"))?;
    debug!(path = %key_path.display(), "received signature from the CA");
    Ok(key_path)
}
