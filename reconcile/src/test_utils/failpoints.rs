//! Scoped configuration of fail points.

use fail::FailScenario;

/// Configures fail points for the lifetime of the value and turns them off again on drop.
pub struct FailpointGuard<'a> {
    _scenario: FailScenario<'a>,
    names: Vec<String>,
}

impl FailpointGuard<'_> {
    /// Configures each `(name, action)` pair, e.g. `("table_sync.before_hash", "return")`.
    pub fn setup(failpoints: &[(&str, &str)]) -> Self {
        let scenario = FailScenario::setup();
        for (name, action) in failpoints {
            fail::cfg(*name, action).expect("invalid fail point action");
        }

        Self {
            _scenario: scenario,
            names: failpoints.iter().map(|(name, _)| name.to_string()).collect(),
        }
    }
}

impl Drop for FailpointGuard<'_> {
    fn drop(&mut self) {
        for name in &self.names {
            fail::remove(name);
        }
    }
}
