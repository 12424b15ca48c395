//! Regression gate: the only door a synthesized improvement can enter by.
//!
//! The check itself is host code - it is never synthesized and the loop it
//! gates cannot rewrite it.

use anyhow::Result;

use super::executor::Executor;
use super::store::CodeStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    Committed,
    Reverted,
}

pub struct RegressionGate {
    store: CodeStore,
    executor: Executor,
}

impl RegressionGate {
    pub fn new(store: CodeStore, executor: Executor) -> Self {
        Self { store, executor }
    }

    /// Write `candidate` into the store, run the fixed regression check
    /// against `test_subject`, and keep the candidate only if the check
    /// passes. On any failure the pre-candidate text is restored exactly.
    pub fn try_commit(&self, candidate: &str, test_subject: &str) -> Result<Commit> {
        let baseline = self.store.load()?;
        self.store.save(candidate)?;

        let passed = match self.executor.execute(test_subject) {
            Ok(attrs) => attrs.get("path").and_then(|v| v.as_str()) == Some(test_subject),
            Err(failure) => {
                log::warn!("regression check raised: {}", failure);
                false
            }
        };

        if passed {
            log::info!("regression check passed; keeping the new logic");
            Ok(Commit::Committed)
        } else {
            log::info!("regression check failed; reverting to the previous logic");
            self.store.save(&baseline)?;
            Ok(Commit::Reverted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate_in(dir: &std::path::Path) -> (CodeStore, RegressionGate) {
        let store = CodeStore::open(dir).unwrap();
        let gate = RegressionGate::new(store.clone(), Executor::new(store.clone()));
        (store, gate)
    }

    #[test]
    fn test_good_candidate_is_committed() {
        let dir = tempfile::tempdir().unwrap();
        let (store, gate) = gate_in(dir.path());
        let candidate = "fn describe(path) { #{ path: path, size: 3 } }";
        assert_eq!(gate.try_commit(candidate, "a.txt").unwrap(), Commit::Committed);
        assert_eq!(store.load().unwrap(), candidate);
    }

    #[test]
    fn test_wrong_path_candidate_reverts_to_exact_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let (store, gate) = gate_in(dir.path());
        let baseline = "fn describe(path) { #{ path: path, kept: true } }";
        store.save(baseline).unwrap();

        // Returns a map, but with `path` nulled out - the fixed check
        // requires path == test subject.
        let candidate = "fn describe(path) { #{ path: () } }";
        assert_eq!(gate.try_commit(candidate, "a.txt").unwrap(), Commit::Reverted);
        assert_eq!(store.load().unwrap(), baseline);
    }

    #[test]
    fn test_raising_candidate_reverts() {
        let dir = tempfile::tempdir().unwrap();
        let (store, gate) = gate_in(dir.path());
        let baseline = store.load().unwrap();
        let candidate = "fn describe(path) { throw \"no\" }";
        assert_eq!(gate.try_commit(candidate, "a.txt").unwrap(), Commit::Reverted);
        assert_eq!(store.load().unwrap(), baseline);
    }

    #[test]
    fn test_unparsable_candidate_reverts() {
        let dir = tempfile::tempdir().unwrap();
        let (store, gate) = gate_in(dir.path());
        let baseline = store.load().unwrap();
        assert_eq!(
            gate.try_commit("definitely not a script {{{", "a.txt").unwrap(),
            Commit::Reverted
        );
        assert_eq!(store.load().unwrap(), baseline);
    }
}
