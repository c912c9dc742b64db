use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "rchat", about = "Terminal chat client")]
pub struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List conversations
    List {
        /// Keep running and reprint the list on live updates
        #[arg(short, long)]
        watch: bool,
    },
    /// Open a conversation and chat in it
    Open {
        /// Conversation id
        conversation: String,
        /// User id of the other participant
        #[arg(long = "to")]
        peer: String,
        /// Label shown for the other participant
        #[arg(long)]
        name: Option<String>,
    },
    /// Store credentials issued by the backend
    Login,
    /// Remove stored credentials
    Logout,
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::List { watch: false })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn defaults_to_list_when_command_is_missing() {
        let cli = Cli::parse_from(["rchat"]);

        assert_eq!(cli.command_or_default(), Command::List { watch: false });
    }

    #[test]
    fn parses_list_watch_with_global_config() {
        let cli = Cli::parse_from(["rchat", "list", "--watch", "--config", "custom.toml"]);

        assert_eq!(cli.command_or_default(), Command::List { watch: true });
        assert_eq!(
            cli.config
                .as_deref()
                .map(|p| p.to_string_lossy().to_string()),
            Some("custom.toml".to_owned())
        );
    }

    #[test]
    fn parses_open_with_peer_and_label() {
        let cli = Cli::parse_from(["rchat", "open", "c42", "--to", "u7", "--name", "Alice"]);

        assert_eq!(
            cli.command_or_default(),
            Command::Open {
                conversation: "c42".to_owned(),
                peer: "u7".to_owned(),
                name: Some("Alice".to_owned()),
            }
        );
    }

    #[test]
    fn open_requires_peer() {
        assert!(Cli::try_parse_from(["rchat", "open", "c42"]).is_err());
    }

    #[test]
    fn parses_login_and_logout() {
        assert_eq!(
            Cli::parse_from(["rchat", "login"]).command_or_default(),
            Command::Login
        );
        assert_eq!(
            Cli::parse_from(["rchat", "logout"]).command_or_default(),
            Command::Logout
        );
    }
}
