//! Compile a script without touching the store

use super::read_script;
use anyhow::Result;
use colored::Colorize;
use hearken_core::ScriptCompiler;
use hearken_lua::LuaCompiler;
use std::path::Path;

pub fn execute(compiler: &LuaCompiler, file: &Path) -> Result<()> {
    let source = read_script(file)?;
    let name = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("stdin");

    match compiler.compile(name, &source) {
        Ok(_) => {
            println!("{} {}", "OK".green().bold(), file.display());
            Ok(())
        }
        Err(diagnostic) => anyhow::bail!("{}: {}", file.display(), diagnostic),
    }
}
