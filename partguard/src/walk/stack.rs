/// The significant ancestors of the element being visited, each tagged with
/// the tree depth it was pushed at.
///
/// Call [`ContextStack::reconcile`] with the current depth before handling
/// every element; entries left over from already-exited subtrees are popped
/// so the stack is exactly the chain of open significant ancestors.
#[derive(Debug, Clone)]
pub struct ContextStack<T> {
    entries: Vec<(T, usize)>,
}

impl<T> Default for ContextStack<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> ContextStack<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tag: T, depth: usize) {
        debug_assert!(self.entries.last().map_or(true, |(_, d)| *d < depth));
        self.entries.push((tag, depth));
    }

    /// Pop every entry at or below `depth`.
    pub fn reconcile(&mut self, depth: usize) {
        while matches!(self.entries.last(), Some((_, d)) if *d >= depth) {
            self.entries.pop();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index).map(|(t, _)| t)
    }

    pub fn top(&self) -> Option<&T> {
        self.entries.last().map(|(t, _)| t)
    }

    /// Depth the entry at `index` was pushed at.
    pub fn depth_of(&self, index: usize) -> Option<usize> {
        self.entries.get(index).map(|(_, d)| *d)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.entries.iter().map(|(t, _)| t)
    }

    pub fn any(&self, mut pred: impl FnMut(&T) -> bool) -> bool {
        self.entries.iter().any(|(t, _)| pred(t))
    }
}
