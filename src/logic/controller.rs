//! Correction controller: bounded retry loop that repairs a failing script.
//!
//! Flow per attempt: execute -> on failure, synthesize a correction and
//! write it straight to the store -> execute again. The correction path
//! deliberately bypasses the regression gate: a failing routine has no
//! working baseline worth protecting. Only the improvement loop gates.

use anyhow::Result;
use std::time::Duration;

use super::executor::Executor;
use super::store::CodeStore;
use super::Attrs;
use crate::synth::Synthesizer;

pub struct Controller {
    executor: Executor,
    store: CodeStore,
    retries: u32,
    pause: Duration,
}

impl Controller {
    pub fn new(executor: Executor, store: CodeStore, retries: u32, pause: Duration) -> Self {
        Self {
            executor,
            store,
            retries: retries.max(1),
            pause,
        }
    }

    /// Execute the current logic, repairing it on failure, up to the retry
    /// bound. Makes exactly `retries` execution attempts before giving up.
    pub fn execute_with_correction(&self, synth: &Synthesizer, subject: &str) -> Result<Attrs> {
        for attempt in 1..=self.retries {
            match self.executor.execute(subject) {
                Ok(attrs) => {
                    log::info!("execution succeeded on attempt {}", attempt);
                    return Ok(attrs);
                }
                Err(failure) => {
                    log::error!(
                        "error in logic execution (attempt {}/{}): {}",
                        attempt,
                        self.retries,
                        failure
                    );
                    if attempt == self.retries {
                        break;
                    }
                    match synth.synthesize_correction(&failure.logic_source, &failure) {
                        Ok(corrected) => self.store.save(&corrected)?,
                        // A failed synthesis leaves the broken script in
                        // place; the next attempt consumes the retry budget
                        // the same way.
                        Err(err) => log::warn!("correction synthesis failed: {}", err),
                    }
                    std::thread::sleep(self.pause);
                }
            }
        }
        anyhow::bail!("all correction attempts failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GenerateAnswers;
    use std::sync::Mutex;

    /// Scripted generator: pops replies in order and counts calls.
    struct StubGenerator {
        replies: Mutex<Vec<String>>,
        calls: Mutex<u32>,
    }

    impl StubGenerator {
        fn new(replies: Vec<&str>) -> Self {
            let mut replies: Vec<String> = replies.into_iter().map(String::from).collect();
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl GenerateAnswers for &StubGenerator {
        fn generate(&self, _prompt: &str) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("stub exhausted"))
        }
    }

    fn controller_in(dir: &std::path::Path, retries: u32) -> (CodeStore, Controller) {
        let store = CodeStore::open(dir).unwrap();
        let controller = Controller::new(
            Executor::new(store.clone()),
            store.clone(),
            retries,
            Duration::ZERO,
        );
        (store, controller)
    }

    fn synth_with(stub: &'static StubGenerator) -> Synthesizer {
        Synthesizer::new(Box::new(stub), Duration::ZERO)
    }

    #[test]
    fn test_success_on_first_attempt_calls_no_generator() {
        let dir = tempfile::tempdir().unwrap();
        let (_, controller) = controller_in(dir.path(), 3);
        let stub: &'static StubGenerator = Box::leak(Box::new(StubGenerator::new(vec![])));
        let attrs = controller
            .execute_with_correction(&synth_with(stub), "a.txt")
            .unwrap();
        assert_eq!(attrs["path"], "a.txt");
        assert_eq!(stub.calls(), 0);
    }

    #[test]
    fn test_correction_commits_directly_and_second_attempt_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let (store, controller) = controller_in(dir.path(), 3);
        store
            .save("fn describe(path) { throw \"kaboom\" }")
            .unwrap();

        let fix = "fn describe(path) { #{ path: path, fixed: true } }";
        let stub: &'static StubGenerator = Box::leak(Box::new(StubGenerator::new(vec![fix])));
        let attrs = controller
            .execute_with_correction(&synth_with(stub), "a.txt")
            .unwrap();
        assert_eq!(attrs["fixed"], true);
        assert_eq!(stub.calls(), 1);
        // The fix went straight into the store - no gate on this path.
        assert_eq!(store.load().unwrap(), fix);
    }

    #[test]
    fn test_retry_bound_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let (store, controller) = controller_in(dir.path(), 3);
        store.save("fn describe(path) { throw \"always\" }").unwrap();

        // Every correction is just as broken, so all three attempts fail.
        let broken = "fn describe(path) { throw \"still broken\" }";
        let stub: &'static StubGenerator =
            Box::leak(Box::new(StubGenerator::new(vec![broken, broken, broken])));
        let err = controller
            .execute_with_correction(&synth_with(stub), "a.txt")
            .unwrap_err();
        assert_eq!(err.to_string(), "all correction attempts failed");
        // 3 execution attempts -> corrections only between them.
        assert_eq!(stub.calls(), 2);
    }

    #[test]
    fn test_synthesis_failure_still_consumes_retry_budget() {
        let dir = tempfile::tempdir().unwrap();
        let (store, controller) = controller_in(dir.path(), 2);
        store.save("fn describe(path) { throw \"always\" }").unwrap();

        // Stub has no replies: every synthesis errors out.
        let stub: &'static StubGenerator = Box::leak(Box::new(StubGenerator::new(vec![])));
        let err = controller
            .execute_with_correction(&synth_with(stub), "a.txt")
            .unwrap_err();
        assert_eq!(err.to_string(), "all correction attempts failed");
    }
}
