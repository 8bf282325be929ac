pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod duration;
pub mod render;
pub mod schedule;
pub mod source;
pub mod sprint;
pub mod window;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use datetime::{
  Calendar,
  Point
};
pub use duration::parse_duration_days;
pub use schedule::{
  Schedule,
  ScheduleEntry,
  build_schedule
};
pub use sprint::SprintRecord;
pub use window::{
  SprintWindow,
  normalize_window
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting cadence CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.cadencerc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );
  for (key, value) in cfg.iter() {
    debug!(key = %key, value = %value, "effective config");
  }

  let sprints_path =
    config::resolve_sprints_path(
      &cfg,
      cli.sprints.as_deref()
    )
    .context(
      "failed to resolve sprint file"
    )?;

  let renderer =
    render::Renderer::new(&cfg)?;

  commands::dispatch(
    &cfg,
    &renderer,
    &sprints_path,
    cli.command
  )?;

  info!("done");
  Ok(())
}
