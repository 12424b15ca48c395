//! One report-generation session: the improvement loop, context generation,
//! and report rendering, run end-to-end on a single worker thread.
//!
//! The worker owns the code store, controller, and synthesizer by move, so
//! only one thread ever mutates the evolving script. Progress flows back to
//! the caller over an mpsc channel. Whatever happens - success or failure -
//! the script is reset to its default on the way out, so no session inherits
//! another session's logic.

use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::generator::GenerateAnswers;
use crate::logic::controller::Controller;
use crate::logic::executor::Executor;
use crate::logic::gate::{Commit, RegressionGate};
use crate::logic::store::CodeStore;
use crate::logic::Attrs;
use crate::report;
use crate::synth::Synthesizer;

/// Messages the worker sends while it runs.
#[derive(Debug)]
pub enum Progress {
    Stage(String),
    Iteration {
        index: u32,
        total: u32,
        committed: bool,
    },
    ReportWritten(PathBuf),
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub subject: PathBuf,
    pub output: PathBuf,
    pub improvements: u32,
    pub include_errors: bool,
    pub retries: u32,
    pub correction_delay: Duration,
    pub improve_delay: Duration,
    pub workdir: PathBuf,
}

pub struct Session {
    opts: SessionOptions,
    store: CodeStore,
    controller: Controller,
    gate: RegressionGate,
    synth: Synthesizer,
    tx: Sender<Progress>,
}

impl Session {
    pub fn new(
        opts: SessionOptions,
        generator: Box<dyn GenerateAnswers>,
        tx: Sender<Progress>,
    ) -> Result<Self> {
        let store = CodeStore::open(&opts.workdir)?;
        let controller = Controller::new(
            Executor::new(store.clone()),
            store.clone(),
            opts.retries,
            opts.correction_delay,
        );
        let gate = RegressionGate::new(store.clone(), Executor::new(store.clone()));
        let synth = Synthesizer::new(generator, opts.improve_delay);
        Ok(Self {
            opts,
            store,
            controller,
            gate,
            synth,
            tx,
        })
    }

    /// Run the whole workflow. The store is reset to the default logic on
    /// every exit path.
    pub fn run(self) -> Result<PathBuf> {
        let result = self.run_inner();
        if let Err(err) = self.store.reset() {
            log::warn!("failed to reset logic on session exit: {}", err);
        }
        result
    }

    fn run_inner(&self) -> Result<PathBuf> {
        let subject = self.opts.subject.to_string_lossy().into_owned();
        let total = self.opts.improvements;

        // Each session starts from the fixed baseline, never from whatever a
        // previous run left behind.
        self.store.reset()?;

        let mut last_text: Option<String> = None;

        for iteration in 0..total {
            self.send(Progress::Stage(format!(
                "improving extraction logic ({}/{})",
                iteration + 1,
                total
            )));

            let current = self.store.load()?;
            log::info!("logic at iteration {}:\n{}", iteration, current);

            let mut last_result = self
                .controller
                .execute_with_correction(&self.synth, &subject)?;
            if let Some(Value::String(text)) = last_result.remove("text") {
                if !text.trim().is_empty() {
                    last_text = Some(text);
                }
            }

            let candidate = match self.synth.synthesize_improvement(
                &current,
                &last_result,
                iteration as usize,
            ) {
                Ok(candidate) => candidate,
                Err(err) => {
                    // The prior logic stays active; the loop does not abort.
                    log::warn!("improvement synthesis failed: {}", err);
                    self.send(Progress::Iteration {
                        index: iteration + 1,
                        total,
                        committed: false,
                    });
                    continue;
                }
            };

            self.persist_candidate(iteration, &candidate);

            let committed =
                matches!(self.gate.try_commit(&candidate, &subject)?, Commit::Committed);
            self.send(Progress::Iteration {
                index: iteration + 1,
                total,
                committed,
            });
        }

        self.send(Progress::Stage("running final extraction".to_string()));
        let mut final_result = self
            .controller
            .execute_with_correction(&self.synth, &subject)?;

        let text_content = match final_result.remove("text") {
            Some(Value::String(text)) if !text.trim().is_empty() => Some(text),
            _ => last_text,
        };

        self.send(Progress::Stage("generating contextual summary".to_string()));
        let context = self.generate_context(text_content.as_deref(), &final_result);
        if let Some(context) = &context {
            self.persist_context(context);
        }

        if let Some(text) = text_content {
            final_result.insert("text".to_string(), Value::String(text));
        }

        self.send(Progress::Stage("rendering report".to_string()));
        report::render(
            &final_result,
            context.as_deref(),
            &self.opts.output,
            self.opts.include_errors,
        )?;

        self.send(Progress::ReportWritten(self.opts.output.clone()));
        Ok(self.opts.output.clone())
    }

    /// Context generation is best-effort: a generator outage costs the
    /// report its summary section, not the whole workflow.
    fn generate_context(&self, text: Option<&str>, attrs: &Attrs) -> Option<String> {
        let result = match text {
            Some(text) => self.synth.generate_context_from_text(text),
            None => {
                let file_name = self
                    .opts
                    .subject
                    .file_name()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let extension = self
                    .opts
                    .subject
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default();
                self.synth
                    .generate_context_from_metadata(&file_name, &extension, attrs)
            }
        };
        match result {
            Ok(context) => Some(context),
            Err(err) => {
                log::warn!("context generation failed: {}", err);
                None
            }
        }
    }

    fn persist_candidate(&self, iteration: u32, candidate: &str) {
        let path = self
            .opts
            .workdir
            .join(format!("candidate_iteration_{}.rhai", iteration + 1));
        if let Err(err) = std::fs::write(&path, candidate) {
            log::warn!("failed to write {}: {}", path.display(), err);
        }
    }

    fn persist_context(&self, context: &str) {
        let path = self.opts.workdir.join("context_info.txt");
        if let Err(err) = std::fs::write(&path, context) {
            log::warn!("failed to write {}: {}", path.display(), err);
        }
    }

    fn send(&self, progress: Progress) {
        // The receiver may already be gone during teardown; nothing to do.
        let _ = self.tx.send(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::DEFAULT_LOGIC;
    use std::path::Path;
    use std::sync::mpsc;
    use std::sync::Mutex;

    struct StubGenerator {
        replies: Mutex<Vec<String>>,
    }

    impl StubGenerator {
        fn new(replies: Vec<&str>) -> Self {
            let mut replies: Vec<String> = replies.into_iter().map(String::from).collect();
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    impl GenerateAnswers for StubGenerator {
        fn generate(&self, _prompt: &str) -> Result<String> {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("stub exhausted"))
        }
    }

    fn options(dir: &Path, improvements: u32) -> (SessionOptions, PathBuf) {
        let subject = dir.join("sample.txt");
        std::fs::write(&subject, "hello world\nsecond line\n").unwrap();
        let output = dir.join("sample_report.pdf");
        (
            SessionOptions {
                subject,
                output: output.clone(),
                improvements,
                include_errors: false,
                retries: 3,
                correction_delay: Duration::ZERO,
                improve_delay: Duration::ZERO,
                workdir: dir.join("work"),
            },
            output,
        )
    }

    #[test]
    fn test_session_improves_and_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let (opts, output) = options(dir.path(), 1);
        let workdir = opts.workdir.clone();

        let improved = "```rhai\nfn describe(path) {\n    #{ path: path, size: file_size(path), text: read_text_head(path, 200) }\n}\n```";
        let generator = StubGenerator::new(vec![improved, "A small note about a text file."]);

        let (tx, rx) = mpsc::channel();
        let session = Session::new(opts, Box::new(generator), tx).unwrap();
        let written = session.run().unwrap();
        assert_eq!(written, output);

        let bytes = std::fs::read(&output).unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        // Candidate artifact persisted, fences already stripped.
        let candidate =
            std::fs::read_to_string(workdir.join("candidate_iteration_1.rhai")).unwrap();
        assert!(candidate.starts_with("fn describe"));
        // Context saved alongside.
        let context = std::fs::read_to_string(workdir.join("context_info.txt")).unwrap();
        assert!(context.contains("small note"));
        // Logic reset on exit.
        let store = CodeStore::open(&workdir).unwrap();
        assert_eq!(store.load().unwrap(), DEFAULT_LOGIC);

        let events: Vec<Progress> = rx.try_iter().collect();
        assert!(events
            .iter()
            .any(|p| matches!(p, Progress::Iteration { committed: true, .. })));
        assert!(events
            .iter()
            .any(|p| matches!(p, Progress::ReportWritten(_))));
    }

    #[test]
    fn test_reverted_candidate_leaves_loop_running() {
        let dir = tempfile::tempdir().unwrap();
        let (opts, output) = options(dir.path(), 1);
        let workdir = opts.workdir.clone();

        // Candidate drops the path invariant; the gate must reject it and
        // the final extraction still succeeds on the baseline logic.
        let bad = "fn describe(path) { #{ path: () } }";
        let generator = StubGenerator::new(vec![bad, "A context blurb."]);

        let (tx, rx) = mpsc::channel();
        let session = Session::new(opts, Box::new(generator), tx).unwrap();
        session.run().unwrap();
        assert!(output.exists());

        let events: Vec<Progress> = rx.try_iter().collect();
        assert!(events
            .iter()
            .any(|p| matches!(p, Progress::Iteration { committed: false, .. })));

        let store = CodeStore::open(&workdir).unwrap();
        assert_eq!(store.load().unwrap(), DEFAULT_LOGIC);
    }

    #[test]
    fn test_generator_outage_still_produces_report() {
        let dir = tempfile::tempdir().unwrap();
        let (opts, output) = options(dir.path(), 2);

        // No replies at all: every synthesis and the context call fail.
        // Baseline logic keeps working, so a plain report still lands.
        let generator = StubGenerator::new(vec![]);

        let (tx, _rx) = mpsc::channel();
        let session = Session::new(opts, Box::new(generator), tx).unwrap();
        session.run().unwrap();
        assert!(output.exists());
    }
}
