use std::path::PathBuf;

const DATA_DIR_ENV: &str = "LEADERBOARD_DATA_DIR";

/// `--data-dir`, then `$LEADERBOARD_DATA_DIR`, then `~/.local/share/leaderboard`.
pub fn resolve_data_dir(flag: Option<PathBuf>) -> Result<PathBuf, String> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").map_err(|err| format!("resolve HOME: {}", err))?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("leaderboard"))
}
