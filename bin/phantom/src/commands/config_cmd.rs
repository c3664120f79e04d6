use phantom_core::Config;
use std::path::Path;

/// Show the effective configuration as pretty-printed JSON.
pub fn show(path: &Path) -> anyhow::Result<()> {
    let config = Config::load_or_default_at(path)?;

    println!();
    println!("📋 Current Configuration");
    if path.exists() {
        println!("  File: {}", path.display());
    } else {
        println!("  File: {} (not found, showing defaults)", path.display());
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Write the default configuration to `path`.
pub fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::default().save(path)?;
    println!("✓ Created config: {}", path.display());
    Ok(())
}
