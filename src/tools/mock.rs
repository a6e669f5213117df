use super::external::{ToolInvocation, ToolOutput, ToolSpec};
use super::runner::ToolRunner;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

type Behavior = Arc<dyn Fn(&ToolInvocation) -> ToolOutput + Send + Sync>;

/// In-process stand-in for external tools
///
/// Behaviours are registered per program file name (`R`, `r4r`, `r-diff`)
/// and may write files into the invocation's working directory to imitate
/// the real tool. Every invocation is recorded.
pub struct MockToolRunner {
    behaviors: Mutex<HashMap<String, Behavior>>,
    invocations: Mutex<Vec<ToolInvocation>>,
}

impl MockToolRunner {
    pub fn new() -> Self {
        Self {
            behaviors: Mutex::new(HashMap::new()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Register the behaviour for a program, replacing any earlier one
    pub fn on<F>(&self, program: impl Into<String>, behavior: F)
    where
        F: Fn(&ToolInvocation) -> ToolOutput + Send + Sync + 'static,
    {
        self.behaviors
            .lock()
            .unwrap()
            .insert(program.into(), Arc::new(behavior));
    }

    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    pub fn count_for(&self, program: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|inv| inv.program_name() == program)
            .count()
    }

    fn behavior(&self, program: &str) -> Option<Behavior> {
        self.behaviors.lock().unwrap().get(program).cloned()
    }
}

impl Default for MockToolRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolRunner for MockToolRunner {
    /// Registered programs resolve to their first candidate path
    fn resolve(&self, spec: &ToolSpec) -> Option<PathBuf> {
        let behaviors = self.behaviors.lock().unwrap();
        spec.candidates
            .iter()
            .find(|c| {
                c.file_name()
                    .map(|n| behaviors.contains_key(&*n.to_string_lossy()))
                    .unwrap_or(false)
            })
            .cloned()
    }

    async fn run(&self, invocation: &ToolInvocation) -> ToolOutput {
        self.invocations.lock().unwrap().push(invocation.clone());
        let program = invocation.program_name();
        match self.behavior(&program) {
            Some(behavior) => behavior(invocation),
            None => ToolOutput::spawn_failed(format!(
                "MockToolRunner: no behaviour registered for {}",
                program
            )),
        }
    }
}
