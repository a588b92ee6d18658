pub mod check;
pub mod fire;
pub mod listeners;

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Read a script from a file, or from stdin when the path is `-`
pub fn read_script(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .context("reading script from stdin")?;
        return Ok(source);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
