use std::env;
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct CliArgs {
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub debug: bool,
}

pub fn parse_args() -> Result<CliArgs, String> {
    parse_from(env::args().skip(1))
}

fn parse_from(args: impl IntoIterator<Item = String>) -> Result<CliArgs, String> {
    let mut args = args.into_iter();
    let mut parsed = CliArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--port" => {
                let value = args
                    .next()
                    .ok_or_else(|| "missing value for --port".to_string())?;
                let port = value
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port value: {value}"))?;
                parsed.port = Some(port);
            }
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| "missing value for --config".to_string())?;
                parsed.config = Some(PathBuf::from(value));
            }
            "--data-dir" => {
                let value = args
                    .next()
                    .ok_or_else(|| "missing value for --data-dir".to_string())?;
                parsed.data_dir = Some(PathBuf::from(value));
            }
            "--debug" => {
                parsed.debug = true;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                return Err(format!("unknown argument: {arg}"));
            }
        }
    }

    Ok(parsed)
}

pub fn print_help() {
    println!(
        "Leaderboard server\n\n\
Usage:\n  leaderboard-server [--port <port>] [--config <path>] [--data-dir <path>] [--debug]\n\n\
Options:\n  --port <port>      Override the configured port for this run only\n  --config <path>    Config file (default: <data dir>/leaderboard.toml)\n  --data-dir <path>  Database directory (default: $LEADERBOARD_DATA_DIR or ~/.local/share/leaderboard)\n  --debug            Log at debug level unless RUST_LOG is set\n  -h, --help         Show this help message\n"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_all_flags() {
        let parsed = parse_from(args(&[
            "--port",
            "8080",
            "--config",
            "/etc/leaderboard.toml",
            "--data-dir",
            "/var/lib/leaderboard",
            "--debug",
        ]))
        .expect("args");
        assert_eq!(parsed.port, Some(8080));
        assert_eq!(parsed.config, Some(PathBuf::from("/etc/leaderboard.toml")));
        assert_eq!(parsed.data_dir, Some(PathBuf::from("/var/lib/leaderboard")));
        assert!(parsed.debug);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse_from(args(&["--port", "http"])).is_err());
        assert!(parse_from(args(&["--config"])).is_err());
        assert!(parse_from(args(&["--verbose"])).is_err());
    }
}
