//! Command implementations
//!
//! `plan` and `apply` share the loading steps in [`Session`]: configuration,
//! the desired-state document and the persisted state of its instance.

pub mod apply;
pub mod kinds;
pub mod plan;
pub mod state;

use anyhow::{Context as AnyhowContext, Result};
use reconcile::{ReconcileContext, RemoteState, ResourceKind};
use std::path::{Path, PathBuf};

use crate::Context;
use crate::config::Config;
use crate::document::Document;
use crate::fmc::FmcClient;
use crate::paths;
use crate::progress;
use crate::state::StateFile;

/// Inputs of one plan or apply run
pub struct Session {
    pub config: Config,
    pub document: Document,
    state_file: StateFile,
    state_path: PathBuf,
    /// Persisted state of the document's instance
    pub state: RemoteState,
}

impl Session {
    pub fn load(ctx: &Context, file: &Path) -> Result<Self> {
        let config = Config::load(ctx.config.as_deref())?;
        let file = paths::expand(&file.to_string_lossy());
        let document = Document::load(&file)?;

        let state_path = StateFile::path()?;
        let state_file = StateFile::load_from(&state_path)?;
        let state = state_file.items(&document.instance, document.kind)?;

        log::info!(
            "{}: {} desired item(s), {} in state",
            document.instance,
            document.items.len(),
            state.len()
        );

        Ok(Self {
            config,
            document,
            state_file,
            state_path,
            state,
        })
    }

    pub fn kind(&self) -> &'static ResourceKind {
        self.document.kind
    }

    /// Whether to list the remote before diffing
    pub fn refresh_enabled(&self, no_refresh: bool) -> bool {
        self.config.apply.refresh && !no_refresh
    }

    pub fn client(&self) -> Result<FmcClient> {
        FmcClient::new(&self.config, self.kind())
    }

    /// Fold what FMC currently lists into the persisted state
    pub fn refresh(&self, ctx: &Context, client: &FmcClient) -> Result<RemoteState> {
        let spinner = if ctx.quiet {
            progress::hidden()
        } else {
            progress::spinner(&format!("Listing {} from FMC...", self.kind().name))
        };
        let rctx = ReconcileContext::new(client);
        let refreshed = reconcile::refresh(&rctx, self.kind(), &self.state);
        spinner.finish_and_clear();
        Ok(refreshed?)
    }

    /// Record the instance's new state and write the state file
    pub fn save(&mut self, state: RemoteState) -> Result<()> {
        let kind = self.kind();
        self.state_file
            .record(&self.document.instance, kind, state.clone());
        self.state_file
            .save_to(&self.state_path)
            .with_context(|| format!("Failed to save state of {}", self.document.instance))?;
        self.state = state;
        Ok(())
    }
}
