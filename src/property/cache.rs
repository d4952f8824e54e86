/// Bounded read cache of a property set.
///
/// A read stores at most `limit` elements. The cache is only authoritative
/// when it holds fewer than `limit` elements: a full cache may be a truncated
/// view of a larger result and is never used to answer membership or size.
#[derive(Debug, Clone)]
pub struct PropertyCache<E> {
    values: Option<Vec<E>>,
    limit: usize,
}

impl<E: Clone> PropertyCache<E> {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            values: None,
            limit: limit.max(1),
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Cached elements, complete or not.
    #[must_use]
    pub fn cached(&self) -> Option<&[E]> {
        self.values.as_deref()
    }

    /// Cached elements when they are the whole result.
    #[must_use]
    pub fn complete(&self) -> Option<&[E]> {
        self.values
            .as_deref()
            .filter(|values| values.len() < self.limit)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete().is_some()
    }

    /// Remembers the head of a result read from the store.
    pub fn store_read(&mut self, values: &[E]) {
        let end = values.len().min(self.limit);
        self.values = Some(values[..end].to_vec());
    }

    /// Seeds the cache with a known complete result, growing the limit so the
    /// seed counts as complete.
    pub fn init(&mut self, values: Vec<E>) {
        if values.len() >= self.limit {
            self.limit = values.len() + 1;
        }
        self.values = Some(values);
    }

    pub fn invalidate(&mut self) {
        self.values = None;
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::PropertyCache;

    #[rstest]
    #[case(0, true)]
    #[case(9, true)]
    #[case(10, false)]
    #[case(25, false)]
    fn completeness_depends_on_the_limit(#[case] read: usize, #[case] complete: bool) {
        let mut cache = PropertyCache::new(10);
        let values: Vec<usize> = (0..read).collect();
        cache.store_read(&values);
        assert_eq!(cache.is_complete(), complete);
        assert_eq!(cache.cached().map(<[usize]>::len), Some(read.min(10)));
    }

    #[test]
    fn init_grows_the_limit() {
        let mut cache = PropertyCache::new(2);
        cache.init(vec![1, 2, 3]);
        assert_eq!(cache.limit(), 4);
        assert_eq!(cache.complete(), Some(&[1, 2, 3][..]));

        cache.invalidate();
        assert!(cache.cached().is_none());
        assert!(!cache.is_complete());
    }
}
