//! Command-line entrypoints for the build status relay.
//!
//! Parses the command and its flags by hand, loads `buildsync.toml`, and dispatches into the
//! relay server or the config check.

use crate::dev_server;
use crate::relay_messages::display_messages::{print_formatted_error, print_relay_messages};
use crate::relay_messages::relay_errors::{RelayError, RelayMessages};
use crate::settings::{self, CONFIG_FILE_NAME, Config, ConfigOverrides, TargetConfig};
use saying::say;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, PartialEq, Eq)]
enum Command {
    // Runs both target build loops and serves status updates to browsers
    Serve {
        config_path: PathBuf,
        overrides: ConfigOverrides,
    },

    // Loads and validates the config, then prints what `serve` would use
    Check(PathBuf),

    Help,
}

pub fn start_cli() {
    let cli_args: Vec<String> = env::args().collect();

    if cli_args.len() < 2 {
        print_help(false);
        return;
    }

    let command = match get_command(&cli_args[1..]) {
        Ok(command) => command,
        Err(e) => {
            print_formatted_error(RelayError::cli_error(e));
            print_help(true);
            return;
        }
    };

    match command {
        Command::Help => {
            print_help(false);
        }

        Command::Serve {
            config_path,
            overrides,
        } => {
            say!("\nStarting build status relay...");
            let result = load_checked_config(&config_path, &overrides)
                .and_then(|config| dev_server::run_relay_server(&config));

            match result {
                Ok(()) => {
                    say!("Relay shut down.");
                }
                Err(messages) => print_relay_messages(messages),
            }
        }

        Command::Check(config_path) => {
            match load_checked_config(&config_path, &ConfigOverrides::default()) {
                Ok(config) => print_resolved_config(&config),
                Err(messages) => print_relay_messages(messages),
            }
        }
    }
}

fn load_checked_config(
    config_path: &Path,
    overrides: &ConfigOverrides,
) -> Result<Config, RelayMessages> {
    let mut config = settings::load_config(config_path)?;
    config.apply_overrides(overrides);
    config.validate(config_path)?;
    Ok(config)
}

fn get_command(args: &[String]) -> Result<Command, String> {
    let command = args.first().map(String::as_str);

    match command {
        Some("help") | Some("--help") | Some("-h") => Ok(Command::Help),
        Some("serve") => parse_serve_command(args),
        Some("check") => parse_check_command(args),
        Some(other) => Err(format!("Invalid command: '{other}'")),
        None => Ok(Command::Help),
    }
}

fn flag_value<'a>(args: &'a [String], index: usize, flag: &str) -> Result<&'a str, String> {
    match args.get(index + 1) {
        Some(value) if !value.starts_with("--") => Ok(value.as_str()),
        _ => Err(format!("Missing value for {flag}")),
    }
}

fn parse_serve_command(args: &[String]) -> Result<Command, String> {
    let mut config_path = PathBuf::from(CONFIG_FILE_NAME);
    let mut overrides = ConfigOverrides::default();
    let mut index = 1usize;

    while let Some(arg) = args.get(index) {
        match arg.as_str() {
            "--config" => {
                config_path = PathBuf::from(flag_value(args, index, "--config")?);
            }
            "--host" => {
                overrides.host = Some(flag_value(args, index, "--host")?.to_owned());
            }
            "--port" => {
                let port_value = flag_value(args, index, "--port")?;
                overrides.port = match port_value.parse::<u16>() {
                    Ok(port) => Some(port),
                    Err(_) => {
                        return Err(format!(
                            "Invalid --port value: '{port_value}'. Port must be a number from 0 to 65535."
                        ));
                    }
                };
            }
            "--poll-interval" => {
                let interval_value = flag_value(args, index, "--poll-interval")?;
                overrides.poll_interval_ms = match interval_value.parse::<u64>() {
                    Ok(interval) if interval > 0 => Some(interval),
                    Ok(_) => {
                        return Err(String::from(
                            "Invalid --poll-interval value: '0'. It must be greater than zero.",
                        ));
                    }
                    Err(_) => {
                        return Err(format!(
                            "Invalid --poll-interval value: '{interval_value}'. It must be a positive integer."
                        ));
                    }
                };
            }
            _ => {
                return Err(format!(
                    "Unknown serve argument: '{arg}'. Supported flags are --config, --host, --port, --poll-interval."
                ));
            }
        }
        index += 2;
    }

    Ok(Command::Serve {
        config_path,
        overrides,
    })
}

fn parse_check_command(args: &[String]) -> Result<Command, String> {
    match args.get(1).map(String::as_str) {
        None => Ok(Command::Check(PathBuf::from(CONFIG_FILE_NAME))),
        Some("--config") => {
            let path = flag_value(args, 1, "--config")?;
            if args.len() > 3 {
                return Err(String::from("Check command only accepts --config <path>."));
            }
            Ok(Command::Check(PathBuf::from(path)))
        }
        Some(other) => Err(format!(
            "Unknown check argument: '{other}'. Only --config <path> is supported."
        )),
    }
}

fn print_resolved_config(config: &Config) {
    say!(Green "Config OK");
    say!("  listen:        ", Bold config.bind_address());
    say!("  poll interval: ", Bold config.poll_interval_ms, " ms");
    say!("  project root:  ", Bold config.project_root.display().to_string());

    for (name, target) in [("client", &config.client), ("server", &config.server)] {
        if let Some(target) = target {
            print_target(name, target, &config.project_root);
        }
    }
}

fn print_target(name: &str, target: &TargetConfig, project_root: &Path) {
    say!("  [", Green name, "]");
    say!("    command: ", target.command.as_str());
    say!("    watch:   ", target.watch_root(project_root).display().to_string());
    if let Some(output_dir) = target.output_dir(project_root) {
        say!("    output:  ", output_dir.display().to_string());
    }
}

fn print_help(commands_only: bool) {
    if !commands_only {
        say!(Dark "------------------------------------");
        say!(Green Bold "buildsync - build status relay");
        say!("Usage: buildsync <command> [flags]");
    }
    say!(Green Bold "Commands:");
    say!("  serve                 - Runs both target build loops and streams build status to browsers");
    say!("      --config <path>       Config file (default: buildsync.toml)");
    say!("      --host <host>         Overrides 'host'");
    say!("      --port <port>         Overrides 'port'");
    say!("      --poll-interval <ms>  Overrides 'poll_interval_ms'");
    say!("  check [--config <path>] - Validates the config and prints the resolved settings");
    say!("  help                  - Shows this message");
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
