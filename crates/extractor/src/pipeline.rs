use crate::summary::RunSummary;
use crate::walker::{SourceWalker, WalkedFile};
use crate::writer::ArtifactWriter;
use crate::{ExtractConfig, ExtractError, Result};
use codelore_model::{Dialect, ParseFailure, ParsedCode, RuleSet, SourceFile, TemplateArtifact};
use codelore_parser::{link_endpoint_models, FileOutcome, MatcherRegistry, StructuralParser};
use codelore_rules::RuleSynthesizer;
use codelore_templates::{scan_template_bytes, TemplateBinder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Files handed to one worker per batch; the budget is checked between batches
const FILES_PER_WORKER_BATCH: usize = 32;

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub parsed: ParsedCode,
    pub rules: RuleSet,
    pub summary: RunSummary,
}

/// What one file turned into during the parse stage
enum FileResult {
    Source(SourceFile, FileOutcome),
    Template(SourceFile, codelore_templates::Result<TemplateArtifact>),
    Unreadable(String, std::io::Error),
}

impl FileResult {
    fn path(&self) -> &str {
        match self {
            Self::Source(file, _) | Self::Template(file, _) => &file.path,
            Self::Unreadable(path, _) => path,
        }
    }
}

/// Walk → parallel parse → re-sort → model links → template binding → rules → write
pub struct Pipeline {
    registry: Arc<MatcherRegistry>,
    synthesizer: RuleSynthesizer,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(MatcherRegistry::builtin()),
            synthesizer: RuleSynthesizer::default(),
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: MatcherRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    #[must_use]
    pub fn with_synthesizer(mut self, synthesizer: RuleSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    /// Full run writing both artifacts into `config.output_dir`
    pub async fn run(&self, root: &Path, config: &ExtractConfig) -> Result<RunOutcome> {
        let started = Instant::now();
        let deadline = config.deadline(started);

        let parsed = self.build_model(root, config, deadline).await?;
        check_budget(deadline)?;

        let synthesis = self.synthesizer.synthesize(&parsed);
        check_budget(deadline)?;
        let rules = RuleSet {
            rules: synthesis.rules,
        };

        let writer = ArtifactWriter::new(&config.output_dir);
        let outputs = writer.write(&parsed, &rules).await?;

        let mut summary = RunSummary::from_model(&parsed);
        summary.record_rules(&rules, synthesis.dropped);
        Ok(finish(parsed, rules, summary, outputs, started))
    }

    /// Structural artifact only
    pub async fn parse_only(&self, root: &Path, config: &ExtractConfig) -> Result<RunOutcome> {
        let started = Instant::now();
        let deadline = config.deadline(started);

        let parsed = self.build_model(root, config, deadline).await?;
        check_budget(deadline)?;

        let outputs = ArtifactWriter::new(&config.output_dir)
            .write_parsed(&parsed)
            .await?;
        let summary = RunSummary::from_model(&parsed);
        Ok(finish(parsed, RuleSet::default(), summary, outputs, started))
    }

    /// Re-run only the rule stage on an existing `parsed_code.json`
    pub async fn synthesize_from_parsed(&self, input: &Path, out_dir: &Path) -> Result<RunOutcome> {
        let started = Instant::now();
        let bytes = tokio::fs::read(input).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ExtractError::input_not_found(input)
            } else {
                ExtractError::Io(err)
            }
        })?;
        let parsed: ParsedCode = serde_json::from_slice(&bytes)?;

        let synthesis = self.synthesizer.synthesize(&parsed);
        let rules = RuleSet {
            rules: synthesis.rules,
        };
        let outputs = ArtifactWriter::new(out_dir).write_rules(&rules).await?;

        let mut summary = RunSummary::from_model(&parsed);
        summary.record_rules(&rules, synthesis.dropped);
        Ok(finish(parsed, rules, summary, outputs, started))
    }

    /// Complete structural model of the repository, nothing written
    pub async fn build_model(
        &self,
        root: &Path,
        config: &ExtractConfig,
        deadline: Option<Instant>,
    ) -> Result<ParsedCode> {
        config.validate()?;
        let walker = SourceWalker::new(root, config)?;
        let files = tokio::task::spawn_blocking(move || walker.walk()).await??;
        check_budget(deadline)?;

        let workers = config.effective_workers(files.len());
        let mut results = self.parse_files(files, workers, deadline).await?;
        // Completion order is not input order.
        results.sort_by(|a, b| a.path().cmp(b.path()));

        let mut parsed = assemble(results);
        link_endpoint_models(&mut parsed.endpoints, &parsed.symbols);
        check_budget(deadline)?;

        let templates = std::mem::take(&mut parsed.templates);
        let bound = TemplateBinder::new(&parsed.symbols, &parsed.endpoints).bind(templates);
        parsed.templates = bound.templates;
        parsed.template_cycles = bound.template_cycles;
        parsed.orphan_references = bound.orphan_references;

        log::info!(
            "Structural model: {} symbols, {} endpoints, {} templates, {} parse failures",
            parsed.symbols.len(),
            parsed.endpoints.len(),
            parsed.templates.len(),
            parsed.parse_failures.len()
        );
        Ok(parsed)
    }

    async fn parse_files(
        &self,
        files: Vec<WalkedFile>,
        workers: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<FileResult>> {
        log::debug!("Parsing {} files with {} workers", files.len(), workers);
        let mut results = Vec::with_capacity(files.len());

        for batch in files.chunks(workers * FILES_PER_WORKER_BATCH) {
            check_budget(deadline)?;
            let per_task = batch.len().div_ceil(workers);
            let mut tasks = Vec::with_capacity(workers);
            for slice in batch.chunks(per_task) {
                let slice = slice.to_vec();
                let registry = Arc::clone(&self.registry);
                tasks.push(tokio::task::spawn_blocking(move || parse_slice(slice, registry)));
            }
            for task in tasks {
                results.extend(task.await??);
            }
        }
        Ok(results)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_slice(files: Vec<WalkedFile>, registry: Arc<MatcherRegistry>) -> Result<Vec<FileResult>> {
    let mut parser = StructuralParser::with_registry(registry)?;
    let mut results = Vec::with_capacity(files.len());
    for file in files {
        let bytes = match std::fs::read(&file.absolute) {
            Ok(bytes) => bytes,
            Err(err) => {
                results.push(FileResult::Unreadable(file.path, err));
                continue;
            }
        };
        let source = SourceFile::new(file.path.clone(), file.dialect, &bytes);
        log::debug!("Parsing {} ({})", file.path, file.dialect.as_str());
        results.push(match file.dialect {
            Dialect::Python => {
                let outcome = parser.parse_bytes(&file.path, &bytes);
                FileResult::Source(source, outcome)
            }
            Dialect::Jinja => FileResult::Template(source, scan_template_bytes(&file.path, &bytes)),
        });
    }
    Ok(results)
}

/// Fold per-file results, already in path order, into one model
fn assemble(results: Vec<FileResult>) -> ParsedCode {
    let mut parsed = ParsedCode::default();
    for result in results {
        match result {
            FileResult::Source(file, FileOutcome::Parsed(model)) => {
                parsed.files.push(file);
                parsed.symbols.extend(model.symbols);
                parsed.endpoints.extend(model.endpoints);
            }
            FileResult::Source(file, FileOutcome::Failed(failure)) => {
                log::warn!("Parse failure in {}: {}", failure.file, failure.reason);
                parsed.files.push(file);
                parsed.parse_failures.push(failure);
            }
            FileResult::Template(file, Ok(template)) => {
                parsed.files.push(file);
                parsed.templates.push(template);
            }
            FileResult::Template(file, Err(err)) => {
                log::warn!("Template scan failure in {}: {err}", file.path);
                parsed.parse_failures.push(ParseFailure {
                    file: file.path.clone(),
                    reason: err.to_string(),
                    line: err.line(),
                });
                parsed.files.push(file);
            }
            FileResult::Unreadable(path, err) => {
                log::warn!("Failed to read {path}: {err}");
                parsed.parse_failures.push(ParseFailure {
                    file: path,
                    reason: format!("unreadable: {err}"),
                    line: None,
                });
            }
        }
    }
    parsed
}

fn finish(
    parsed: ParsedCode,
    rules: RuleSet,
    mut summary: RunSummary,
    outputs: Vec<PathBuf>,
    started: Instant,
) -> RunOutcome {
    summary.outputs = outputs;
    summary.duration_ms = started.elapsed().as_millis() as u64;
    summary.log();
    RunOutcome {
        parsed,
        rules,
        summary,
    }
}

fn check_budget(deadline: Option<Instant>) -> Result<()> {
    if let Some(deadline) = deadline {
        if Instant::now() >= deadline {
            return Err(ExtractError::BudgetExceeded);
        }
    }
    Ok(())
}
