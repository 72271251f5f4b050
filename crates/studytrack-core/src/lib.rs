pub mod auth;
pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod form;
pub mod legacy;
pub mod notify;
pub mod reminders;
pub mod remote;
pub mod render;
pub mod store;
pub mod task;

use std::ffi::OsString;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info,
  warn
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
    "starting studytrack"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rcfile.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let datastore = Arc::new(
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?
  );

  let renderer =
    render::Renderer::new(&cfg)?;
  let command =
    cli.command.unwrap_or_else(|| {
      cli::Command::List(
        cli::ListArgs::default()
      )
    });

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  let notifier = Arc::new(
    notify::CollectingNotifier::new()
  );
  let store = store::TaskStore::new(
    datastore.clone(),
    auth::Session::new(),
    notifier.clone()
  );

  let outcome = runtime.block_on(async {
    if let Some(user) =
      datastore.active_user()?
    {
      debug!(user = %user, "restoring session");
      store.session().login(user.clone());
      if let Err(err) = store
        .handle_auth_change(Some(user))
        .await
      {
        warn!(error = %err, "initial load failed");
      }
    }

    commands::dispatch(
      &store, &datastore, &cfg,
      &renderer, command
    )
    .await
  });

  renderer
    .print_notices(&notifier.drain())?;
  outcome?;

  info!("done");
  Ok(())
}
