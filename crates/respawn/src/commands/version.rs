//! Version command

use crate::cli::VersionArgs;
use crate::version::VersionInfo;
use anyhow::Result;

pub fn run(args: VersionArgs) -> Result<()> {
    let info = VersionInfo::current();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{}", info.display());
    if let Some(executable) = &info.executable {
        println!("Executable: {}", executable);
    }
    println!("Staged:     {}", if info.staged { "yes" } else { "no" });
    println!("Backup:     {}", if info.backup { "yes" } else { "no" });

    Ok(())
}
