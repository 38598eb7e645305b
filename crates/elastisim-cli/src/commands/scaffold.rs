use std::path::Path;

use elastisim_core::ElastiConfig;

pub fn scaffold(output: Option<&Path>) -> anyhow::Result<()> {
    let rendered = ElastiConfig::scaffold().to_toml_string()?;

    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            println!("✓ Generated {}", path.display());
        }
        None => print!("{rendered}"),
    }

    Ok(())
}
