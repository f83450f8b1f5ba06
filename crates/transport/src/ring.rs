//! Lock-free bounded SPSC ring buffer.
//!
//! The ring holds `capacity.next_power_of_two()` slots so that indices wrap
//! with a mask instead of a modulo. Head and tail are free-running
//! [`AtomicUsize`] counters: the producer owns `tail`, the consumer owns
//! `head`, and each publishes its counter with `Release` after touching a
//! slot so the other side's `Acquire` load observes the slot contents fully
//! written (or fully vacated). The two counters live on separate cache
//! lines to avoid false sharing between the producer and consumer cores.
//!
//! The endpoint types are `Send` but deliberately not `Clone`: exactly one
//! thread may push and exactly one thread may pop, and the type system
//! enforces it. No allocation happens after construction.

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;

/// Error returned by [`Producer::try_push`] when the ring is full.
///
/// Carries the rejected item back to the caller so nothing is lost
/// silently; the caller decides whether to retry, drop, or apply
/// backpressure.
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Recover the rejected item.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Full(..)")
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("channel is full")
    }
}

impl<T> std::error::Error for Full<T> {}

/// Shared ring storage. `head` is written only by the consumer, `tail`
/// only by the producer; each slot is accessed by at most one side at a
/// time thanks to the head/tail protocol.
struct Shared<T> {
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Index of the next slot to read. Free-running; masked on access.
    head: CachePadded<AtomicUsize>,
    /// Index of the next slot to write. Free-running; masked on access.
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: the SPSC protocol guarantees that a slot is accessed by exactly
// one thread at a time; the endpoints are the only handles and are not
// cloneable, so `Shared` may be shared across the two threads.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // Exclusive access here; drop any items still in flight.
        let tail = *self.tail.get_mut();
        let mut i = *self.head.get_mut();
        while i != tail {
            let slot = self.buf[i & self.mask].get_mut();
            // SAFETY: slots in [head, tail) hold initialized items.
            unsafe { slot.assume_init_drop() };
            i = i.wrapping_add(1);
        }
    }
}

/// Create a bounded SPSC channel with at least `capacity` slots.
///
/// The capacity is rounded up to the next power of two so index wrapping is
/// a mask.
///
/// # Panics
///
/// Panics if `capacity` is zero. A zero-capacity channel is an
/// unrecoverable misconfiguration; the pipeline configuration rejects it
/// before construction ever gets here.
pub fn channel<T: Send>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(capacity > 0, "ring capacity must be non-zero");
    let capacity = capacity.next_power_of_two();

    let buf: Box<[UnsafeCell<MaybeUninit<T>>]> = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect();

    let shared = Arc::new(Shared {
        buf,
        mask: capacity - 1,
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
    });

    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

/// The push endpoint of an SPSC ring. Owned by exactly one thread.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send> Producer<T> {
    /// Attempt to enqueue `item` without blocking.
    ///
    /// Returns `Err(Full(item))` when the ring is full, handing the item
    /// back to the caller.
    pub fn try_push(&mut self, item: T) -> Result<(), Full<T>> {
        let tail = self.shared.tail.load(Ordering::Relaxed);
        let head = self.shared.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) == self.shared.buf.len() {
            return Err(Full(item));
        }

        let slot = &self.shared.buf[tail & self.shared.mask];
        // SAFETY: `tail - head < capacity`, so this slot is vacant, and
        // only this producer writes slots.
        unsafe { (*slot.get()).write(item) };

        self.shared.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Ring capacity in slots.
    pub fn capacity(&self) -> usize {
        self.shared.buf.len()
    }

    /// Number of occupied slots at the instant of the call.
    pub fn len(&self) -> usize {
        let tail = self.shared.tail.load(Ordering::Relaxed);
        let head = self.shared.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    /// Returns `true` if the ring was empty at the instant of the call.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The pop endpoint of an SPSC ring. Owned by exactly one thread.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send> Consumer<T> {
    /// Attempt to dequeue the oldest item without blocking.
    pub fn try_pop(&mut self) -> Option<T> {
        let head = self.shared.head.load(Ordering::Relaxed);
        let tail = self.shared.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        let slot = &self.shared.buf[head & self.shared.mask];
        // SAFETY: `head != tail`, so this slot holds an initialized item
        // published by the producer's `Release` store of `tail`, and only
        // this consumer reads slots.
        let item = unsafe { (*slot.get()).assume_init_read() };

        self.shared.head.store(head.wrapping_add(1), Ordering::Release);
        Some(item)
    }

    /// Ring capacity in slots.
    pub fn capacity(&self) -> usize {
        self.shared.buf.len()
    }

    /// Number of occupied slots at the instant of the call.
    pub fn len(&self) -> usize {
        let head = self.shared.head.load(Ordering::Relaxed);
        let tail = self.shared.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    /// Returns `true` if the ring was empty at the instant of the call.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let (mut tx, mut rx) = channel::<u32>(8);
        for i in 0..5 {
            tx.try_push(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(rx.try_pop(), Some(i));
        }
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn test_empty_pop_returns_none() {
        let (_tx, mut rx) = channel::<u32>(4);
        assert_eq!(rx.try_pop(), None);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_full_push_returns_item() {
        let (mut tx, mut rx) = channel::<u32>(4);
        for i in 0..4 {
            tx.try_push(i).unwrap();
        }
        let err = tx.try_push(99).unwrap_err();
        assert_eq!(err.into_inner(), 99);

        // Popping one slot makes room again.
        assert_eq!(rx.try_pop(), Some(0));
        tx.try_push(99).unwrap();
        assert_eq!(rx.try_pop(), Some(1));
    }

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        let (tx, _rx) = channel::<u32>(5);
        assert_eq!(tx.capacity(), 8);
        let (tx, _rx) = channel::<u32>(8);
        assert_eq!(tx.capacity(), 8);
        let (tx, _rx) = channel::<u32>(1);
        assert_eq!(tx.capacity(), 1);
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn test_zero_capacity_panics() {
        let _ = channel::<u32>(0);
    }

    #[test]
    fn test_len() {
        let (mut tx, mut rx) = channel::<u32>(4);
        assert_eq!(tx.len(), 0);
        tx.try_push(1).unwrap();
        tx.try_push(2).unwrap();
        assert_eq!(tx.len(), 2);
        assert_eq!(rx.len(), 2);
        rx.try_pop().unwrap();
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_wraparound_many_times() {
        let (mut tx, mut rx) = channel::<u64>(4);
        for i in 0..1000u64 {
            tx.try_push(i).unwrap();
            assert_eq!(rx.try_pop(), Some(i));
        }
    }

    #[test]
    fn test_in_flight_items_dropped_with_ring() {
        let marker = Arc::new(());
        {
            let (mut tx, rx) = channel::<Arc<()>>(8);
            for _ in 0..5 {
                tx.try_push(Arc::clone(&marker)).unwrap();
            }
            drop(tx);
            drop(rx);
        }
        assert_eq!(Arc::strong_count(&marker), 1);
    }

    #[test]
    fn test_spsc_two_thread_stress() {
        const N: u64 = 100_000;
        let (mut tx, mut rx) = channel::<u64>(64);

        std::thread::scope(|s| {
            s.spawn(move || {
                for i in 0..N {
                    let mut item = i;
                    loop {
                        match tx.try_push(item) {
                            Ok(()) => break,
                            Err(Full(back)) => {
                                item = back;
                                std::hint::spin_loop();
                            }
                        }
                    }
                }
            });

            s.spawn(move || {
                let mut expected = 0u64;
                while expected < N {
                    match rx.try_pop() {
                        Some(v) => {
                            assert_eq!(v, expected, "FIFO order violated");
                            expected += 1;
                        }
                        None => std::hint::spin_loop(),
                    }
                }
                assert_eq!(rx.try_pop(), None);
            });
        });
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    /// A push (`Some(value)`) or a pop (`None`).
    fn arb_ops() -> impl Strategy<Value = Vec<Option<u32>>> {
        proptest::collection::vec(proptest::option::weighted(0.6, any::<u32>()), 0..200)
    }

    proptest! {
        // The ring behaves exactly like a capacity-bounded VecDeque under
        // any single-threaded push/pop interleaving.
        #[test]
        fn ring_matches_deque_model(ops in arb_ops(), cap_exp in 0u32..5) {
            let capacity = 1usize << cap_exp;
            let (mut tx, mut rx) = channel::<u32>(capacity);
            let mut model: VecDeque<u32> = VecDeque::new();

            for op in ops {
                match op {
                    Some(v) => {
                        let pushed = tx.try_push(v).is_ok();
                        if model.len() < capacity {
                            prop_assert!(pushed);
                            model.push_back(v);
                        } else {
                            prop_assert!(!pushed);
                        }
                    }
                    None => {
                        prop_assert_eq!(rx.try_pop(), model.pop_front());
                    }
                }
                prop_assert_eq!(tx.len(), model.len());
            }

            // Drain and compare the tail end.
            while let Some(expected) = model.pop_front() {
                prop_assert_eq!(rx.try_pop(), Some(expected));
            }
            prop_assert_eq!(rx.try_pop(), None);
        }
    }
}
