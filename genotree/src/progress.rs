use std::fmt::Debug;

use derive_more::{Add, AddAssign, Sub};

/// Number of (decompressed) input bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Default, Add, AddAssign, Sub)]
#[repr(transparent)]
pub struct ByteNum(usize);

impl ByteNum {
    pub const ZERO: ByteNum = ByteNum(0);

    #[inline]
    #[must_use]
    pub const fn new(bytes: usize) -> Self {
        Self(bytes)
    }

    #[inline]
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }
}

/// Receives progress events from the long-running parts of a run: the
/// streaming source reports bytes it has decoded, the clusterer reports merge
/// iterations.
pub trait ProgressNotifier: Debug + Send + Sync {
    fn processed_bytes(&self, bytes: ByteNum);

    fn set_iter_num(&self, num_iter: u64);

    fn inc_iter(&self);
}

impl<T: ProgressNotifier> ProgressNotifier for &T {
    fn processed_bytes(&self, bytes: ByteNum) {
        T::processed_bytes(self, bytes)
    }

    fn set_iter_num(&self, num_iter: u64) {
        T::set_iter_num(self, num_iter)
    }

    fn inc_iter(&self) {
        T::inc_iter(self)
    }
}

/// Progress notifier that ignores every event.
#[derive(Clone, Debug, Default)]
pub struct DummyProgressNotifier;

impl ProgressNotifier for DummyProgressNotifier {
    fn processed_bytes(&self, _bytes: ByteNum) {}

    fn set_iter_num(&self, _num_iter: u64) {}

    fn inc_iter(&self) {}
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    use crate::progress::{ByteNum, DummyProgressNotifier, ProgressNotifier};

    #[derive(Debug, Default)]
    struct CountingNotifier {
        bytes: AtomicUsize,
        iters: AtomicU64,
    }

    impl ProgressNotifier for CountingNotifier {
        fn processed_bytes(&self, bytes: ByteNum) {
            self.bytes.fetch_add(bytes.get(), Ordering::Relaxed);
        }

        fn set_iter_num(&self, _num_iter: u64) {}

        fn inc_iter(&self) {
            self.iters.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_dummy_progress_notifier() {
        let notifier = DummyProgressNotifier;
        notifier.processed_bytes(ByteNum::new(1337));
        notifier.inc_iter();
    }

    #[test]
    fn test_notifier_by_reference() {
        let notifier = CountingNotifier::default();
        {
            let by_ref = &notifier;
            by_ref.processed_bytes(ByteNum::new(10));
            by_ref.processed_bytes(ByteNum::new(32));
            by_ref.inc_iter();
        }

        assert_eq!(notifier.bytes.load(Ordering::Relaxed), 42);
        assert_eq!(notifier.iters.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_byte_num_arithmetic() {
        let mut total = ByteNum::ZERO;
        total += ByteNum::new(100);
        total += ByteNum::new(28);

        assert_eq!(total, ByteNum::new(128));
        assert_eq!(total - ByteNum::new(28), ByteNum::new(100));
    }
}
