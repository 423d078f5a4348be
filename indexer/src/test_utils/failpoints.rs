use fail::FailScenario;

/// Configures fail points for as long as it is alive.
///
/// Scenarios are exclusive: a second one waits until the first is dropped. Every configured
/// fail point is switched off again on drop.
pub struct IndexFailScenario<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<String>,
}

impl<'a> IndexFailScenario<'a> {
    /// Applies each `(fail point, action)` pair, e.g. `("index_rebuild.before_write", "return")`.
    pub fn setup(failpoints: &[(&str, &str)]) -> IndexFailScenario<'a> {
        let scenario = FailScenario::setup();
        for (failpoint, action) in failpoints {
            fail::cfg(*failpoint, action).unwrap();
        }

        Self {
            _scenario: scenario,
            failpoints: failpoints
                .iter()
                .map(|(failpoint, _)| failpoint.to_string())
                .collect(),
        }
    }

    /// Switches `failpoint` off while keeping the scenario, and its exclusivity, alive.
    pub fn disable(&self, failpoint: &str) {
        fail::remove(failpoint);
    }
}

impl Drop for IndexFailScenario<'_> {
    fn drop(&mut self) {
        for failpoint in &self.failpoints {
            fail::remove(failpoint);
        }
    }
}
