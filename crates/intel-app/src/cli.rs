//! CLI argument definitions for partner-intel.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "PARTNER_INTEL_CONFIG";

/// Environment variable overriding the server port.
pub const PORT_ENV: &str = "PARTNER_INTEL_PORT";

const DEFAULT_PORT: u16 = 3030;

/// partner-intel: ask a language model to investigate a company's partner
/// portal through the partner intelligence engine.
#[derive(Parser, Debug)]
#[command(name = "partner-intel", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG wins if set.
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the chat page and JSON API on 127.0.0.1.
    Serve {
        /// API server port.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
    },
    /// Interactive chat in the terminal (default).
    Chat,
    /// Check, and wake, the analysis backend.
    Probe,
    /// Write a config file with default values.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl CliArgs {
    /// The subcommand to run; `chat` when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Chat)
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PARTNER_INTEL_CONFIG > ~/.partner-intel/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_config_path_with<F>(&self, env: F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = env(CONFIG_ENV) {
            return PathBuf::from(p);
        }
        default_config_path(&env)
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > PARTNER_INTEL_PORT > config file value > 3030.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        self.resolve_port_with(config_port, |name| std::env::var(name).ok())
    }

    pub fn resolve_port_with<F>(&self, config_port: u16, env: F) -> u16
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(Command::Serve { port: Some(p) }) = self.command {
            return p;
        }
        if let Some(p) = env(PORT_ENV).and_then(|v| v.trim().parse::<u16>().ok()) {
            return p;
        }
        if config_port != 0 {
            return config_port;
        }
        DEFAULT_PORT
    }

    /// Resolve the log level: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path<F>(env: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    #[cfg(target_os = "windows")]
    if let Some(home) = env("USERPROFILE") {
        return PathBuf::from(home).join(".partner-intel").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Some(home) = env("HOME") {
        return PathBuf::from(home).join(".partner-intel").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_command_is_chat() {
        assert_eq!(parse(&["partner-intel"]).command(), Command::Chat);
    }

    #[test]
    fn test_subcommands() {
        assert_eq!(
            parse(&["partner-intel", "serve", "--port", "8080"]).command(),
            Command::Serve { port: Some(8080) }
        );
        assert_eq!(parse(&["partner-intel", "probe"]).command(), Command::Probe);
        assert_eq!(
            parse(&["partner-intel", "init", "--force"]).command(),
            Command::Init { force: true }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = parse(&["partner-intel", "chat", "--config", "/tmp/x.toml", "-l", "debug"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/x.toml")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_port_priority() {
        let env = |name: &str| (name == PORT_ENV).then(|| "4000".to_string());

        let flag = parse(&["partner-intel", "serve", "-p", "5000"]);
        assert_eq!(flag.resolve_port_with(3030, env), 5000);

        let no_flag = parse(&["partner-intel", "serve"]);
        assert_eq!(no_flag.resolve_port_with(3030, env), 4000);
        assert_eq!(no_flag.resolve_port_with(3131, no_env), 3131);
        assert_eq!(no_flag.resolve_port_with(0, no_env), 3030);
    }

    #[test]
    fn test_bad_port_env_is_ignored() {
        let env = |name: &str| (name == PORT_ENV).then(|| "not-a-port".to_string());
        let args = parse(&["partner-intel", "serve"]);
        assert_eq!(args.resolve_port_with(3131, env), 3131);
    }

    #[test]
    fn test_config_path_priority() {
        let env = |name: &str| match name {
            CONFIG_ENV => Some("/etc/pi.toml".to_string()),
            "HOME" | "USERPROFILE" => Some("/home/ana".to_string()),
            _ => None,
        };

        let flag = parse(&["partner-intel", "-c", "/tmp/flag.toml"]);
        assert_eq!(flag.resolve_config_path_with(env), PathBuf::from("/tmp/flag.toml"));

        let none = parse(&["partner-intel"]);
        assert_eq!(none.resolve_config_path_with(env), PathBuf::from("/etc/pi.toml"));

        let home_only = |name: &str| match name {
            "HOME" | "USERPROFILE" => Some("/home/ana".to_string()),
            _ => None,
        };
        assert_eq!(
            none.resolve_config_path_with(home_only),
            PathBuf::from("/home/ana")
                .join(".partner-intel")
                .join("config.toml")
        );
        assert_eq!(none.resolve_config_path_with(no_env), PathBuf::from("config.toml"));
    }

    #[test]
    fn test_log_level_priority() {
        assert_eq!(parse(&["partner-intel"]).resolve_log_level("warn"), "warn");
        assert_eq!(
            parse(&["partner-intel", "--log-level", "trace"]).resolve_log_level("warn"),
            "trace"
        );
    }
}
