/// Identifies one synchronous dispatch batch.
///
/// A batch starts with an externally dispatched action and ends when every
/// follow-up action it queued has been reduced. Observers see state only at
/// batch boundaries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Batch {
    /// 0-based batch index.
    pub index: u64,
}

impl Batch {
    pub fn new(index: u64) -> Self {
        Self { index }
    }

    pub fn next(self) -> Self {
        Self::new(self.index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::Batch;

    #[test]
    fn next_advances_index() {
        assert_eq!(Batch::new(3).next(), Batch::new(4));
        assert_eq!(Batch::default().index, 0);
    }
}
