//! Generation pipeline
//!
//! Per unit: model → rules → scopes → plan and emit for each backend. Both
//! backends render from the same resolved snapshot. Multiple units run on
//! scoped worker threads; results come back in input order.

use crate::backend::{self, Backend, Planner};
use crate::config::Configuration;
use crate::decl::TranslationUnitDecl;
use crate::manifest::{self, Manifest};
use crate::model::Model;
use crate::rules;
use crate::scope::ScopeResolver;
use crate::ui::ProgressMessage;
use crate::{Error, Result};
use crossbeam::channel::Sender;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Shared cancellation flag, checked between phases
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One generated source file
#[derive(Debug, Clone)]
pub struct Artifact {
    pub backend: Backend,
    pub file_name: String,
    pub source: String,
}

/// Everything generated for one unit, not yet on disk
#[derive(Debug, Clone)]
pub struct UnitOutput {
    pub unit: String,
    pub module: String,
    pub artifacts: Vec<Artifact>,
    pub manifest: Manifest,
}

impl UnitOutput {
    pub fn artifact(&self, backend: Backend) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.backend == backend)
    }

    /// Write both artifacts and the manifest into `dir`
    ///
    /// Every file goes to a temporary sibling first; nothing is renamed
    /// into place until all of them were written. On failure the staged
    /// files that were not renamed yet are removed.
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let mut files: Vec<(String, String)> = self
            .artifacts
            .iter()
            .map(|a| (a.file_name.clone(), a.source.clone()))
            .collect();
        files.push((Manifest::file_name(&self.module), self.manifest.to_json()?));

        let mut staged = Vec::with_capacity(files.len());
        for (name, contents) in &files {
            let target = dir.join(name);
            let temp = dir.join(format!("{}.tmp", name));
            if let Err(e) = std::fs::write(&temp, contents) {
                let _ = std::fs::remove_file(&temp);
                remove_staged(&staged);
                return Err(e.into());
            }
            staged.push((temp, target));
        }

        let mut written = Vec::with_capacity(staged.len());
        for (index, (temp, target)) in staged.iter().enumerate() {
            if let Err(e) = std::fs::rename(temp, target) {
                remove_staged(&staged[index..]);
                return Err(e.into());
            }
            debug!("Wrote {}", target.display());
            written.push(target.clone());
        }
        Ok(written)
    }
}

fn remove_staged(staged: &[(PathBuf, PathBuf)]) {
    for (temp, _) in staged {
        let _ = std::fs::remove_file(temp);
    }
}

/// Runs the pipeline under one configuration
pub struct Generator {
    config: Configuration,
}

impl Generator {
    pub fn new(config: Configuration) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Generate both backends for one unit
    pub fn generate(&self, unit: &TranslationUnitDecl, cancel: &CancelFlag) -> Result<UnitOutput> {
        let started = Instant::now();
        cancel.check()?;

        let mut model = Model::build(unit)?;
        rules::apply(&mut model, &self.config)?;
        cancel.check()?;

        let graph = ScopeResolver::new(&model, &self.config).resolve()?;
        cancel.check()?;

        let module = self.config.module.name.clone();
        let mut manifest = Manifest::new(
            &unit.name,
            &module,
            manifest::input_hash(unit, &self.config)?,
        );
        let mut artifacts = Vec::with_capacity(Backend::ALL.len());
        for backend in Backend::ALL {
            cancel.check()?;
            let plan = Planner::new(&model, &graph, &self.config, backend).plan()?;
            let source = backend::dialect(backend).emit(&model, &plan)?;
            artifacts.push(Artifact {
                backend,
                file_name: plan.manifest.artifact.clone(),
                source,
            });
            manifest.insert(backend, plan.manifest);
        }
        cancel.check()?;

        info!(
            "Generated {} ({} nodes) in {:?}",
            unit.name,
            model.len(),
            started.elapsed()
        );
        Ok(UnitOutput {
            unit: unit.name.clone(),
            module,
            artifacts,
            manifest,
        })
    }

    /// Generate every unit in parallel, one worker per unit
    ///
    /// Results are in input order. A failing unit does not stop the others.
    pub fn generate_all(
        &self,
        units: &[TranslationUnitDecl],
        cancel: &CancelFlag,
        progress: Option<&Sender<ProgressMessage>>,
    ) -> Vec<Result<UnitOutput>> {
        if let Some(tx) = progress {
            let _ = tx.send(ProgressMessage::Started { total: units.len() });
        }

        let (tx, rx) = crossbeam::channel::unbounded::<(usize, Result<UnitOutput>)>();
        let scoped = crossbeam::scope(|s| {
            for (index, unit) in units.iter().enumerate() {
                let tx = tx.clone();
                s.spawn(move |_| {
                    let result = self.generate(unit, cancel);
                    if let Some(progress) = progress {
                        let _ = progress.send(ProgressMessage::UnitFinished {
                            unit: unit.name.clone(),
                            ok: result.is_ok(),
                        });
                    }
                    let _ = tx.send((index, result));
                });
            }
        });
        drop(tx);
        if scoped.is_err() {
            warn!("A generation worker panicked");
        }

        let mut slots: Vec<Option<Result<UnitOutput>>> = units.iter().map(|_| None).collect();
        for (index, result) in rx.iter() {
            slots[index] = Some(result);
        }

        if let Some(tx) = progress {
            let _ = tx.send(ProgressMessage::Finished);
        }

        slots
            .into_iter()
            .zip(units)
            .map(|(slot, unit)| {
                slot.unwrap_or_else(|| Err(Error::WorkerPanicked(unit.name.clone())))
            })
            .collect()
    }
}
