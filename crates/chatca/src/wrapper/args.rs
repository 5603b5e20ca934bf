//! chatssh argument handling
//!
//! chatssh flags may appear anywhere on the command line. They are pulled
//! out before clap sees them and everything else is handed to `ssh`
//! untouched, so `chatssh -p 2222 root@host --bot ca-bot` works.

use clap::{ArgGroup, Parser};

/// A flag chatssh recognizes among ssh's arguments
struct OwnFlag {
    name: &'static str,
    takes_value: bool,
    /// Also passed on to ssh
    preserve: bool,
}

const OWN_FLAGS: &[OwnFlag] = &[
    OwnFlag { name: "--bot", takes_value: true, preserve: false },
    OwnFlag { name: "--request-principal", takes_value: true, preserve: false },
    OwnFlag { name: "--provision", takes_value: false, preserve: false },
    OwnFlag { name: "--set-default-bot", takes_value: true, preserve: false },
    OwnFlag { name: "--clear-default-bot", takes_value: false, preserve: false },
    OwnFlag { name: "--set-default-user", takes_value: true, preserve: false },
    OwnFlag { name: "--clear-default-user", takes_value: false, preserve: false },
    OwnFlag { name: "--set-keybase-binary", takes_value: true, preserve: false },
    OwnFlag { name: "--help", takes_value: false, preserve: false },
    OwnFlag { name: "--version", takes_value: false, preserve: false },
    OwnFlag { name: "-v", takes_value: false, preserve: true },
];

/// ssh with short-lived certificates from a chatca authority
#[derive(Debug, Parser)]
#[command(name = "chatssh", version, about)]
#[command(override_usage = "chatssh [chatssh options] [ssh arguments...]")]
#[command(group(
    ArgGroup::new("manage")
        .args(["set_default_bot", "clear_default_bot", "set_default_user", "clear_default_user", "set_keybase_binary"])
        .multiple(false)
))]
pub struct ChatsshArgs {
    /// Authority bot to request the certificate from
    #[arg(long, value_name = "BOT")]
    pub bot: Option<String>,

    /// Ask for the principal of a team that requires approval
    #[arg(long, value_name = "TEAM")]
    pub request_principal: Option<String>,

    /// Obtain a certificate and add it to the ssh-agent without running ssh
    #[arg(long)]
    pub provision: bool,

    /// Remember the bot to use when several authorities are reachable
    #[arg(long, value_name = "BOT")]
    pub set_default_bot: Option<String>,

    /// Forget the default bot
    #[arg(long)]
    pub clear_default_bot: bool,

    /// Remember the ssh user to log in as
    #[arg(long, value_name = "USER")]
    pub set_default_user: Option<String>,

    /// Forget the default ssh user
    #[arg(long)]
    pub clear_default_user: bool,

    /// Use this keybase binary instead of the one on PATH
    #[arg(long, value_name = "PATH")]
    pub set_keybase_binary: Option<String>,

    /// Debug output for chatssh and ssh
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Arguments handed to ssh
    #[arg(skip)]
    pub ssh_args: Vec<String>,
}

/// What a chatssh invocation should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetDefaultBot(String),
    ClearDefaultBot,
    SetDefaultUser(String),
    ClearDefaultUser,
    SetKeybaseBinary(String),
    Provision,
    Ssh,
}

impl ChatsshArgs {
    /// Parse a full argv, program name included
    pub fn parse_from_env<I>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = String>,
    {
        let mut argv = argv.into_iter();
        let program = argv.next().unwrap_or_else(|| "chatssh".to_string());
        let (own, ssh_args) = split_arguments(argv.collect())?;

        let mut args = Self::try_parse_from(std::iter::once(program).chain(own))?;
        args.ssh_args = ssh_args;
        Ok(args)
    }

    /// The single action requested
    pub fn action(&self) -> Action {
        if let Some(bot) = &self.set_default_bot {
            Action::SetDefaultBot(bot.clone())
        } else if self.clear_default_bot {
            Action::ClearDefaultBot
        } else if let Some(user) = &self.set_default_user {
            Action::SetDefaultUser(user.clone())
        } else if self.clear_default_user {
            Action::ClearDefaultUser
        } else if let Some(path) = &self.set_keybase_binary {
            Action::SetKeybaseBinary(path.clone())
        } else if self.provision {
            Action::Provision
        } else {
            Action::Ssh
        }
    }
}

/// Separate chatssh's own flags from the arguments meant for ssh
fn split_arguments(args: Vec<String>) -> Result<(Vec<String>, Vec<String>), clap::Error> {
    let mut own = Vec::new();
    let mut ssh = Vec::new();
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        // `--flag=value` form
        if let Some((name, _)) = arg.split_once('=') {
            if OWN_FLAGS.iter().any(|f| f.takes_value && f.name == name) {
                own.push(arg);
                continue;
            }
        }

        let Some(flag) = OWN_FLAGS.iter().find(|f| f.name == arg) else {
            ssh.push(arg);
            continue;
        };

        if flag.preserve {
            ssh.push(arg.clone());
        }
        if flag.takes_value {
            let value = iter.next().ok_or_else(|| {
                clap::Error::raw(
                    clap::error::ErrorKind::InvalidValue,
                    format!("argument {} requires a value\n", flag.name),
                )
            })?;
            own.push(arg);
            own.push(value);
        } else {
            own.push(arg);
        }
    }

    Ok((own, ssh))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ChatsshArgs {
        ChatsshArgs::parse_from_env(
            std::iter::once("chatssh").chain(args.iter().copied()).map(String::from),
        )
        .unwrap()
    }

    #[test]
    fn test_own_flags_are_extracted_anywhere() {
        let args = parse(&["-p", "2222", "root@server", "--bot", "ca-bot", "uptime"]);
        assert_eq!(args.bot.as_deref(), Some("ca-bot"));
        assert_eq!(args.ssh_args, vec!["-p", "2222", "root@server", "uptime"]);
        assert_eq!(args.action(), Action::Ssh);
    }

    #[test]
    fn test_verbose_is_shared_with_ssh() {
        let args = parse(&["-v", "root@server"]);
        assert!(args.verbose);
        assert_eq!(args.ssh_args, vec!["-v", "root@server"]);
    }

    #[test]
    fn test_equals_form_and_principal() {
        let args = parse(&["--request-principal=infra.ssh.root", "--provision"]);
        assert_eq!(args.request_principal.as_deref(), Some("infra.ssh.root"));
        assert_eq!(args.action(), Action::Provision);
        assert!(args.ssh_args.is_empty());
    }

    #[test]
    fn test_management_actions() {
        assert_eq!(
            parse(&["--set-default-bot", "ca-bot"]).action(),
            Action::SetDefaultBot("ca-bot".to_string())
        );
        assert_eq!(parse(&["--clear-default-user"]).action(), Action::ClearDefaultUser);
        assert_eq!(
            parse(&["--set-keybase-binary", "/opt/keybase/bin/keybase"]).action(),
            Action::SetKeybaseBinary("/opt/keybase/bin/keybase".to_string())
        );
    }

    #[test]
    fn test_conflicting_management_flags_rejected() {
        let result = ChatsshArgs::parse_from_env(
            ["chatssh", "--clear-default-bot", "--set-default-user", "root"]
                .into_iter()
                .map(String::from),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_value_rejected() {
        let result =
            ChatsshArgs::parse_from_env(["chatssh", "--bot"].into_iter().map(String::from));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_long_flags_go_to_ssh() {
        let args = parse(&["-o", "StrictHostKeyChecking=no", "--", "host"]);
        assert_eq!(args.ssh_args, vec!["-o", "StrictHostKeyChecking=no", "--", "host"]);
    }
}
