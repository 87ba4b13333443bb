//! Wraps bodies of IR into named, invocable functions.

use crate::ir::{CompiledFunction, Statement};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

static FUNCTION_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Collects the functions synthesized while compiling one template.
#[derive(Debug, Default)]
pub struct FunctionSynthesizer {
    functions: Vec<Arc<CompiledFunction>>,
}

impl FunctionSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `body` as `<prefix>_<n>` and returns it with the statement that calls it.
    pub fn wrap(
        &mut self,
        body: Vec<Statement>,
        prefix: &str,
    ) -> (Arc<CompiledFunction>, Statement) {
        let n = FUNCTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let function = Arc::new(CompiledFunction {
            name: format!("{}_{}", prefix, n),
            body,
        });
        self.functions.push(function.clone());
        let call = Statement::CallFunction(function.clone());
        (function, call)
    }

    pub fn functions(&self) -> &[Arc<CompiledFunction>] {
        &self.functions
    }

    pub fn into_functions(self) -> Vec<Arc<CompiledFunction>> {
        self.functions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique_and_registered() {
        let mut synth = FunctionSynthesizer::new();
        let (a, _) = synth.wrap(vec![Statement::Text("a".into())], "foreach");
        let (b, call) = synth.wrap(vec![], "foreach");
        assert_ne!(a.name, b.name);
        assert!(a.name.starts_with("foreach_"));
        assert_eq!(synth.functions().len(), 2);
        assert!(matches!(call, Statement::CallFunction(f) if f.name == b.name));
    }
}
