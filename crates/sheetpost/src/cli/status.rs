//! Configuration display command handler.

use sheetpost::{ConfigError, SheetpostConfig, SheetpostResult};

/// Handle the `status` command
pub fn show_status(config: &SheetpostConfig) -> SheetpostResult<()> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::new(format!("Failed to render configuration: {}", e)))?;
    println!("{}", json);

    if let Err(e) = config.validate() {
        eprintln!("Configuration is invalid: {}", e);
        return Err(e);
    }
    Ok(())
}
