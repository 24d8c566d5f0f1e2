//! Apply command: restart into the staged or promoted build

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use respawn_core::PromotionMode;
use respawn_update::{staged_path, ProcessReplacer};
use std::env;
use std::ffi::OsString;

use crate::cli::{ApplyArgs, UpstreamArgs};
use crate::commands::load_runtime;
use crate::output;

pub fn run(args: ApplyArgs, config_dir: Option<&Utf8Path>) -> Result<()> {
    let runtime = load_runtime(config_dir, &UpstreamArgs::default())?;
    let executable = env::current_exe().context("Failed to get current executable path")?;

    let promotion = runtime.restart.promotion;
    if promotion == PromotionMode::OnRestart && !staged_path(&executable).is_file() {
        bail!(
            "No staged build at {}; run 'respawn check' first",
            staged_path(&executable).display()
        );
    }

    let replacer = ProcessReplacer::new(&executable, promotion, runtime.restart.ready_timeout())
        .with_args(restart_args(env::args_os().next(), args.args));

    output::info(&format!("Restarting {} ({})", executable.display(), promotion));
    let never = replacer.restart_and_update().context("Restart failed")?;
    match never {}
}

/// Argument vector for the restarted process
fn restart_args(argv0: Option<OsString>, args: Vec<OsString>) -> Vec<OsString> {
    let argv0 = argv0.unwrap_or_else(|| OsString::from("respawn"));
    let rest = if args.is_empty() {
        vec![OsString::from("watch")]
    } else {
        args
    };
    std::iter::once(argv0).chain(rest).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_args_default_to_watch() {
        let args = restart_args(Some("/usr/local/bin/respawn".into()), Vec::new());
        assert_eq!(
            args,
            vec![OsString::from("/usr/local/bin/respawn"), OsString::from("watch")]
        );
    }

    #[test]
    fn test_restart_args_keep_explicit_args() {
        let args = restart_args(None, vec!["watch".into(), "--apply".into()]);
        assert_eq!(
            args,
            vec![
                OsString::from("respawn"),
                OsString::from("watch"),
                OsString::from("--apply")
            ]
        );
    }
}
