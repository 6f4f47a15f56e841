//! Bounded priority queue of process handles.
//!
//! The scheduler keeps ready processes here and takes the most urgent one next. Capacity is
//! fixed at [`MAX_QUEUE_SIZE`]; the queue is small enough that dequeue is a linear scan for the
//! minimum priority followed by a shift of the remaining handles.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;

use crate::Process;
use crate::layout::MAX_QUEUE_SIZE;

/// Anything the scheduler can order by priority.
///
/// Lower values are more urgent.
pub trait Prioritized {
    /// Returns the scheduling priority.
    fn priority(&self) -> u32;
}

impl Prioritized for Process {
    fn priority(&self) -> u32 {
        Process::priority(self)
    }
}

impl<T: Prioritized + ?Sized> Prioritized for &T {
    fn priority(&self) -> u32 {
        (**self).priority()
    }
}

impl<T: Prioritized + ?Sized> Prioritized for Box<T> {
    fn priority(&self) -> u32 {
        (**self).priority()
    }
}

impl<T: Prioritized + ?Sized> Prioritized for Arc<T> {
    fn priority(&self) -> u32 {
        (**self).priority()
    }
}

/// Returned by [`ProcessQueue::enqueue`] when the queue is full. Carries the rejected handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFull<T>(pub T);

impl<T> QueueFull<T> {
    /// Returns the handle that was not queued.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process queue is full ({MAX_QUEUE_SIZE} entries)")
    }
}

impl<T: fmt::Debug> core::error::Error for QueueFull<T> {}

/// A fixed-capacity queue that hands out the handle with the lowest priority value first.
///
/// Handles with equal priority leave in the order they arrived.
///
/// # Examples
///
/// ```
/// use vmm::{Prioritized, ProcessQueue};
///
/// #[derive(Debug)]
/// struct Job(u32);
///
/// impl Prioritized for Job {
///     fn priority(&self) -> u32 {
///         self.0
///     }
/// }
///
/// let mut queue = ProcessQueue::new();
/// for priority in [5, 1, 3] {
///     queue.enqueue(Job(priority)).unwrap();
/// }
/// assert_eq!(queue.dequeue().0, 1);
/// assert_eq!(queue.dequeue().0, 3);
/// assert_eq!(queue.dequeue().0, 5);
/// assert!(queue.is_empty());
/// ```
pub struct ProcessQueue<T> {
    slots: [Option<T>; MAX_QUEUE_SIZE],
    count: usize,
}

impl<T: Prioritized> ProcessQueue<T> {
    /// Creates an empty queue.
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; MAX_QUEUE_SIZE],
            count: 0,
        }
    }

    /// Returns the number of queued handles.
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the queue is empty.
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns true if the queue is full.
    pub const fn is_full(&self) -> bool {
        self.count >= MAX_QUEUE_SIZE
    }

    /// Returns the maximum number of handles the queue can hold.
    pub const fn capacity(&self) -> usize {
        MAX_QUEUE_SIZE
    }

    /// Appends `handle` at the back of the queue.
    ///
    /// Fails with the handle if the queue is full.
    pub fn enqueue(&mut self, handle: T) -> Result<(), QueueFull<T>> {
        if self.is_full() {
            log::warn!("process queue full, rejecting handle");
            return Err(QueueFull(handle));
        }

        self.slots[self.count] = Some(handle);
        self.count += 1;
        Ok(())
    }

    /// Removes and returns the most urgent handle.
    ///
    /// # Panics
    ///
    /// Panics if the queue is empty. Check [`ProcessQueue::is_empty`] first or use
    /// [`ProcessQueue::try_dequeue`].
    pub fn dequeue(&mut self) -> T {
        self.try_dequeue().expect("dequeue called on an empty process queue")
    }

    /// Removes and returns the most urgent handle, or `None` if the queue is empty.
    pub fn try_dequeue(&mut self) -> Option<T> {
        let mut best: Option<(usize, u32)> = None;
        for (index, slot) in self.slots[..self.count].iter().enumerate() {
            let Some(handle) = slot else {
                continue;
            };
            let priority = handle.priority();
            // Strictly lower only, so the earliest of equal priorities wins.
            if best.is_none_or(|(_, lowest)| priority < lowest) {
                best = Some((index, priority));
            }
        }

        let (index, _) = best?;
        let handle = self.slots[index].take();

        // Shift the remaining handles to close the gap
        for i in index..self.count - 1 {
            self.slots[i] = self.slots[i + 1].take();
        }
        self.count -= 1;

        handle
    }

    /// Returns an iterator over the queued handles in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots[..self.count].iter().filter_map(Option::as_ref)
    }
}

impl<T: Prioritized> Default for ProcessQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProcessId;

    #[derive(Debug, PartialEq, Eq)]
    struct Job {
        name: &'static str,
        priority: u32,
    }

    impl Prioritized for Job {
        fn priority(&self) -> u32 {
            self.priority
        }
    }

    fn job(name: &'static str, priority: u32) -> Job {
        Job { name, priority }
    }

    #[test]
    fn starts_empty() {
        let queue: ProcessQueue<Job> = ProcessQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.capacity(), MAX_QUEUE_SIZE);
    }

    #[test]
    fn dequeues_lowest_priority_first() {
        let mut queue = ProcessQueue::new();
        queue.enqueue(job("a", 5)).unwrap();
        queue.enqueue(job("b", 1)).unwrap();
        queue.enqueue(job("c", 3)).unwrap();

        assert_eq!(queue.dequeue().name, "b");
        assert_eq!(queue.dequeue().name, "c");
        assert_eq!(queue.dequeue().name, "a");
        assert!(queue.is_empty());
    }

    #[test]
    fn ties_leave_in_arrival_order() {
        let mut queue = ProcessQueue::new();
        queue.enqueue(job("first", 2)).unwrap();
        queue.enqueue(job("second", 2)).unwrap();

        assert_eq!(queue.dequeue().name, "first");
        assert_eq!(queue.dequeue().name, "second");
    }

    #[test]
    fn remaining_handles_keep_their_order() {
        let mut queue = ProcessQueue::new();
        for (name, priority) in [("a", 4), ("b", 9), ("c", 0), ("d", 7), ("e", 4)] {
            queue.enqueue(job(name, priority)).unwrap();
        }

        assert_eq!(queue.dequeue().name, "c");
        let names: Vec<_> = queue.iter().map(|job| job.name).collect();
        assert_eq!(names, ["a", "b", "d", "e"]);

        queue.enqueue(job("f", 0)).unwrap();
        assert_eq!(queue.dequeue().name, "f");
        assert_eq!(queue.dequeue().name, "a");
        assert_eq!(queue.dequeue().name, "e");
    }

    #[test]
    fn full_queue_hands_back_the_handle() {
        let mut queue = ProcessQueue::new();
        for n in 0..MAX_QUEUE_SIZE as u32 {
            queue.enqueue(job("filler", n + 1)).unwrap();
        }
        assert!(queue.is_full());

        let rejected = queue.enqueue(job("late", 0)).unwrap_err();
        assert_eq!(rejected.into_inner(), job("late", 0));
        assert_eq!(queue.len(), MAX_QUEUE_SIZE);
        assert_eq!(queue.dequeue().priority, 1);
    }

    #[test]
    fn try_dequeue_on_empty() {
        let mut queue: ProcessQueue<Job> = ProcessQueue::new();
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    #[should_panic(expected = "dequeue called on an empty process queue")]
    fn dequeue_on_empty_panics() {
        let mut queue: ProcessQueue<Job> = ProcessQueue::new();
        queue.dequeue();
    }

    #[test]
    fn queues_processes_by_reference() {
        let urgent = Process::new(ProcessId::new(1).unwrap(), 0);
        let idle = Process::new(ProcessId::new(2).unwrap(), 9);

        let mut queue = ProcessQueue::new();
        queue.enqueue(&idle).unwrap();
        queue.enqueue(&urgent).unwrap();

        assert_eq!(queue.dequeue().pid(), urgent.pid());
        assert_eq!(queue.dequeue().pid(), idle.pid());
    }

    #[test]
    fn queues_shared_processes() {
        let mut queue = ProcessQueue::new();
        for (pid, priority) in [(1, 3), (2, 2)] {
            let process = Process::new(ProcessId::new(pid).unwrap(), priority);
            queue.enqueue(Arc::new(process)).unwrap();
        }
        assert_eq!(queue.dequeue().pid().get(), 2);
    }
}
