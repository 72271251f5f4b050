use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::filter::{
  FilterMode,
  SortKey
};
use crate::reminders::{
  DEFAULT_LOOKAHEAD_HOURS,
  lookahead_window
};

const RC_ENV_VAR: &str = "STUDYTRACKRC";
const RC_FILE_NAME: &str =
  ".studytrackrc";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
  Grid,
  Calendar
}

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  pub fn defaults() -> Self {
    let mut cfg = Config {
      map:          HashMap::new(),
      loaded_files: vec![]
    };

    for (key, value) in [
      ("data.location", "~/.studytrack"),
      ("color", "on"),
      ("default.filter", "all"),
      ("default.sort", "due"),
      ("default.view", "grid"),
      (
        "reminder.lookahead_hours",
        "24"
      )
    ] {
      cfg.map.insert(
        key.to_string(),
        value.to_string()
      );
    }
    cfg
  }

  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::defaults();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading rc file");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no rc file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn default_filter(
    &self
  ) -> anyhow::Result<FilterMode> {
    self
      .get("default.filter")
      .map(|raw| raw.parse::<FilterMode>())
      .transpose()
      .context(
        "invalid default.filter"
      )
      .map(Option::unwrap_or_default)
  }

  pub fn default_sort(
    &self
  ) -> anyhow::Result<SortKey> {
    self
      .get("default.sort")
      .map(|raw| raw.parse::<SortKey>())
      .transpose()
      .context("invalid default.sort")
      .map(Option::unwrap_or_default)
  }

  pub fn default_view(
    &self
  ) -> anyhow::Result<ViewMode> {
    match self
      .get("default.view")
      .unwrap_or_default()
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "" | "grid" => Ok(ViewMode::Grid),
      | "calendar" => {
        Ok(ViewMode::Calendar)
      }
      | other => {
        Err(anyhow!(
          "invalid default.view: \
           {other}"
        ))
      }
    }
  }

  pub fn reminder_lookahead_hours(
    &self
  ) -> anyhow::Result<i64> {
    let Some(raw) = self
      .get("reminder.lookahead_hours")
    else {
      return Ok(DEFAULT_LOOKAHEAD_HOURS);
    };
    let hours: i64 =
      raw.trim().parse().with_context(
        || {
          format!(
            "invalid \
             reminder.lookahead_hours: \
             {raw}"
          )
        }
      )?;
    lookahead_window(hours).context(
      "invalid \
       reminder.lookahead_hours"
    )?;
    Ok(hours)
  }

  /// Reads one rc file. Included files
  /// are resolved against the including
  /// file's directory; a file already
  /// loaded is not read twice.
  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    if self.loaded_files.contains(&path)
    {
      warn!(rc = %path.display(), "rc file already loaded; skipping");
      return Ok(());
    }

    let text = fs::read_to_string(
      &path
    )
    .with_context(|| {
      format!(
        "failed to read {}",
        path.display()
      )
    })?;
    self.loaded_files.push(path.clone());

    let base_dir = path
      .parent()
      .map_or_else(
        || PathBuf::from("."),
        Path::to_path_buf
      );

    for (idx, raw) in
      text.lines().enumerate()
    {
      let entry = parse_rc_line(raw)
        .with_context(|| {
          format!(
            "invalid config line \
             {}:{}",
            path.display(),
            idx + 1
          )
        })?;

      match entry {
        | RcLine::Blank => {}
        | RcLine::Include(target) => {
          let target = resolve_include_path(
            &base_dir, &target
          );
          if target.exists() {
            debug!(include = %target.display(), "following include");
            self.load_file(&target)?;
          } else {
            warn!(include = %target.display(), "include file does not exist; skipping");
          }
        }
        | RcLine::Setting(key, value) => {
          trace!(%key, %value, "rc setting");
          self.map.insert(key, value);
        }
      }
    }

    Ok(())
  }
}

#[derive(Debug, PartialEq, Eq)]
enum RcLine {
  Blank,
  Include(String),
  Setting(String, String)
}

fn parse_rc_line(
  raw: &str
) -> anyhow::Result<RcLine> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim();

  if line.is_empty() {
    return Ok(RcLine::Blank);
  }

  if let Some(target) =
    line.strip_prefix("include ")
  {
    let target = target.trim();
    if target.is_empty() {
      return Err(anyhow!(
        "include needs a path"
      ));
    }
    return Ok(RcLine::Include(
      target.to_string()
    ));
  }

  match line.split_once('=') {
    | Some((key, value))
      if !key.trim().is_empty() =>
    {
      Ok(RcLine::Setting(
        key.trim().to_string(),
        value.trim().to_string()
      ))
    }
    | _ => {
      Err(anyhow!(
        "expected key = value, got \
         {raw:?}"
      ))
    }
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".studytrack"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> PathBuf {
  let expanded =
    expand_tilde(Path::new(include));
  if expanded.is_absolute() {
    expanded
  } else {
    base_dir.join(expanded)
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
