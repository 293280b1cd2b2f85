//! Traversal strategy shared by the upstream searches

use flowtrace_core::{Error, Result};

/// How upstream searches walk the flow tree.
///
/// Both strategies produce identical results. `Iterative` keeps its own
/// stack on the heap and handles arbitrarily long flow paths; `Recursive`
/// runs on a dedicated thread whose stack is sized for `max_depth` levels
/// and fails with [`Error::RecursionLimit`] past that depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Traversal {
    #[default]
    Iterative,
    Recursive { max_depth: usize },
}

impl Traversal {
    /// Default recursion depth limit
    pub const DEFAULT_MAX_DEPTH: usize = 100_000;

    /// Recursive traversal with the default depth limit
    pub fn recursive() -> Self {
        Traversal::Recursive {
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }

    pub fn is_recursive(&self) -> bool {
        matches!(self, Traversal::Recursive { .. })
    }
}

/// Stack bytes reserved per recursion level
const FRAME_BYTES: usize = 1024;
const BASE_STACK: usize = 1 << 20;

/// Run `f` on a thread with enough stack for `max_depth` nested calls.
pub(crate) fn with_recursion_stack<R, F>(max_depth: usize, f: F) -> Result<R>
where
    R: Send,
    F: FnOnce() -> Result<R> + Send,
{
    let stack_size = max_depth.saturating_mul(FRAME_BYTES).saturating_add(BASE_STACK);

    std::thread::scope(|scope| {
        let handle = std::thread::Builder::new()
            .name("flowtrace-recursive".into())
            .stack_size(stack_size)
            .spawn_scoped(scope, f)?;
        handle
            .join()
            .map_err(|_| Error::Algorithm("recursive traversal thread panicked".into()))?
    })
}

/// Fail once `depth` goes past `max_depth`
#[inline]
pub(crate) fn check_depth(depth: usize, max_depth: usize) -> Result<()> {
    if depth > max_depth {
        return Err(Error::RecursionLimit { limit: max_depth });
    }
    Ok(())
}
