//! Generation and deployment pipeline.
//! Loads the configuration, materializes the template into a scoped temporary
//! directory and then either archives it or imports and deploys it. A single
//! template file can also be expanded on its own.

use chrono::Local;
use log::{error, info};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::{
    archive::{produce_archive, template_name, write_archive, AssetKind},
    client::{ConnectOptions, DeployRequest, ImportedRevision, ManagementClient},
    config::{config_str, load_config, require_keys, Config, EnvVars},
    constants::WORKING_TREE_DIR,
    error::{Error, Result},
    ignore::skip_patterns,
    processor::{materialize, render_in_place},
    renderer::TemplateRenderer,
};

/// Settings for importing and deploying the generated bundle.
#[derive(Debug, Clone)]
pub struct DeploySettings {
    /// Target environments; empty means import only
    pub environments: Vec<String>,
    pub service_account: String,
    pub connect: ConnectOptions,
}

/// What to do with the materialized working tree.
#[derive(Debug, Clone)]
pub enum Mode {
    /// Write a zip archive into `out_dir`; never contacts the remote service.
    Generate { out_dir: PathBuf },
    /// Import the bundle and deploy it to the configured environments.
    Deploy(DeploySettings),
    /// Render the single template file at the source path and return the text.
    /// Required configuration keys are not checked.
    Expand,
}

/// Result of deploying to one environment.
#[derive(Debug)]
pub struct DeploymentOutcome {
    pub environment: String,
    pub result: Result<()>,
}

/// Terminal state of a successful pipeline run.
#[derive(Debug)]
pub enum Outcome {
    Archived(PathBuf),
    Imported { revision: ImportedRevision, deployments: Vec<DeploymentOutcome> },
    Expanded(String),
}

/// A working tree inside its scoped temporary directory.
/// The directory is removed when this value is dropped.
pub struct WorkingTree {
    dir: TempDir,
    root: PathBuf,
}

impl WorkingTree {
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scratch(&self) -> &Path {
        self.dir.path()
    }
}

/// One invocation of the generator: a template source and its configuration.
/// The source is a directory tree, or a single file in [`Mode::Expand`].
pub struct Pipeline<'a> {
    engine: &'a dyn TemplateRenderer,
    source: PathBuf,
    config_path: PathBuf,
    env: EnvVars,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        engine: &'a dyn TemplateRenderer,
        source: PathBuf,
        config_path: PathBuf,
        env: EnvVars,
    ) -> Self {
        Self { engine, source, config_path, env }
    }

    /// Loads the configuration and checks the required keys.
    pub fn load_config(&self) -> Result<Config> {
        let config = load_config(&self.config_path, self.engine, &self.env)?;
        require_keys(&config)?;
        Ok(config)
    }

    /// Renders the source file against the configuration, without requiring
    /// any particular key.
    pub fn expand(&self) -> Result<String> {
        let config = load_config(&self.config_path, self.engine, &self.env)?;
        let template = std::fs::read_to_string(&self.source)?;
        self.engine.render(&template, &serde_json::Value::Object(config), &self.source)
    }

    /// Copies and renders the source tree into a fresh temporary directory.
    pub fn materialize(&self, config: &Config) -> Result<WorkingTree> {
        let proxy_name = proxy_name(config)?;
        let dir = TempDir::new()?;
        let root = dir.path().join(WORKING_TREE_DIR);
        let skip = skip_patterns()?;
        materialize(&self.source, &root, &skip, &proxy_name, |path| {
            render_in_place(self.engine, config, path)
        })?;
        Ok(WorkingTree { dir, root })
    }

    /// Runs the whole pipeline.
    ///
    /// `connect` is only invoked in deploy mode, after the working tree is
    /// complete. The temporary directory is removed on every path.
    pub fn run<C, F>(&self, mode: &Mode, connect: F) -> Result<Outcome>
    where
        C: ManagementClient,
        F: FnOnce(&ConnectOptions) -> Result<C>,
    {
        match mode {
            Mode::Expand => {
                let rendered = self.expand()?;
                info!("template {} expanded", self.source.display());
                Ok(Outcome::Expanded(rendered))
            }
            Mode::Generate { out_dir } => {
                let (_, tree) = self.prepare()?;
                let archive = self.archive(&tree, AssetKind::detect(&self.source), out_dir)?;
                info!("generated archive {}", archive.display());
                Ok(Outcome::Archived(archive))
            }
            Mode::Deploy(settings) => {
                let (config, tree) = self.prepare()?;
                let client = connect(&settings.connect)?;
                info!("connected");
                let kind = AssetKind::detect(&self.source);
                deploy(&client, &tree, kind, &proxy_name(&config)?, settings)
            }
        }
    }

    fn prepare(&self) -> Result<(Config, WorkingTree)> {
        let config = self.load_config()?;
        info!("configuration loaded from {}", self.config_path.display());

        let tree = self.materialize(&config)?;
        info!("template {} materialized", self.source.display());
        Ok((config, tree))
    }

    fn archive(&self, tree: &WorkingTree, kind: AssetKind, out_dir: &Path) -> Result<PathBuf> {
        let source = self.source.canonicalize().unwrap_or_else(|_| self.source.clone());
        let name = template_name(&source);
        produce_archive(tree.root(), kind, &name, out_dir, &Local::now())
            .map_err(remove_partial_archive)
    }
}

fn proxy_name(config: &Config) -> Result<String> {
    config_str(config, "proxyname")
        .ok_or_else(|| Error::MissingRequiredConfigKey { keys: vec!["proxyname".to_string()] })
}

/// Deletes the partially written file of a failed archive.
fn remove_partial_archive(err: Error) -> Error {
    if let Error::ArchiveWriteError { path, .. } = &err {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                error!("could not remove partial archive {}: {}", path.display(), e);
            }
        }
    }
    err
}

/// Imports the working tree and deploys the new revision to each environment.
///
/// A failed deployment is logged and recorded; the remaining environments are
/// still attempted.
fn deploy<C: ManagementClient>(
    client: &C,
    tree: &WorkingTree,
    kind: AssetKind,
    proxy_name: &str,
    settings: &DeploySettings,
) -> Result<Outcome> {
    info!("importing the generated {} bundle", kind);
    let bundle = tree.scratch().join(format!("{}.zip", proxy_name));
    write_archive(tree.root(), &bundle).map_err(remove_partial_archive)?;

    let revision = client.import_bundle(kind, proxy_name, &bundle)?;
    info!("import ok. {} name: {} r{}", kind, revision.name, revision.revision);

    if settings.environments.is_empty() {
        info!("finished (not deploying)");
        return Ok(Outcome::Imported { revision, deployments: Vec::new() });
    }

    let mut deployments = Vec::with_capacity(settings.environments.len());
    for environment in &settings.environments {
        let request = DeployRequest {
            kind,
            name: revision.name.clone(),
            revision: revision.revision.clone(),
            environment: environment.clone(),
            service_account: settings.service_account.clone(),
        };
        let result = client.deploy(&request);
        match &result {
            Ok(()) => info!("deployment to {} ok.", environment),
            Err(e) => error!("deployment to {} failed: {}", environment, e),
        }
        deployments.push(DeploymentOutcome { environment: environment.clone(), result });
    }
    info!("all done.");

    Ok(Outcome::Imported { revision, deployments })
}
