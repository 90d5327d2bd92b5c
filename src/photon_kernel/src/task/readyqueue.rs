//! Task ready queue implementation (internal use only).
use core::fmt;

use super::{TaskCb, TaskId, NUM_PRIORITY_LEVELS};
use crate::{
    klock::{CpuLockCell, CpuLockTokenRefMut},
    utils::{Init, PrioBitmap},
    PortThreading,
};

/// The head and tail of one FIFO list of Ready tasks. The links between
/// elements are stored in [`TaskCb::link`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ListHead {
    first: Option<TaskId>,
    last: Option<TaskId>,
}

impl Init for ListHead {
    const INIT: Self = Self {
        first: None,
        last: None,
    };
}

/// The ready queue implementation that uses a set of queues segregated by the
/// priorities of contained tasks.
///
/// Tasks are serviced in FIFO order within a priority level: they are
/// inserted at the back and removed from the front.
pub(crate) struct BitmapQueue<Traits> {
    /// The set of segregated task ready queues, in which each queue stores
    /// the list of Ready tasks at the corresponding priority.
    ///
    /// Invariant: `queues[i].first.is_some() == bitmap.get(i)`
    queues: [CpuLockCell<Traits, ListHead>; NUM_PRIORITY_LEVELS],

    /// The task ready bitmap, in which each bit indicates whether the
    /// segregated queue corresponding to that bit contains a task or not.
    bitmap: CpuLockCell<Traits, PrioBitmap<NUM_PRIORITY_LEVELS>>,
}

impl<Traits> Init for BitmapQueue<Traits> {
    const INIT: Self = Self {
        queues: Init::INIT,
        bitmap: Init::INIT,
    };
}

impl<Traits: PortThreading> fmt::Debug for BitmapQueue<Traits> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BitmapQueue")
            .field("bitmap", &self.bitmap)
            .finish_non_exhaustive()
    }
}

impl<Traits: PortThreading> BitmapQueue<Traits> {
    /// Empty every queue.
    pub(super) fn reset(&self, mut lock: CpuLockTokenRefMut<'_, Traits>) {
        for queue in self.queues.iter() {
            queue.replace(&mut *lock, ListHead::INIT);
        }
        self.bitmap.replace(&mut *lock, PrioBitmap::INIT);
    }

    /// Return a flag indicating whether there's a task in Ready state.
    pub(super) fn has_ready_task(&self, lock: CpuLockTokenRefMut<'_, Traits>) -> bool {
        !self.bitmap.read(&*lock).is_empty()
    }

    /// Insert the specified task at the back of the queue for `priority`.
    ///
    /// The task must not be included in any queue.
    pub(super) fn push_back_task(
        &self,
        mut lock: CpuLockTokenRefMut<'_, Traits>,
        tasks: &[TaskCb<Traits>],
        task: TaskId,
        priority: usize,
    ) {
        debug_assert!(tasks[task.get()].link.read(&*lock).is_none());

        let queue = &self.queues[priority];
        let mut head = *queue.read(&*lock);

        if let Some(last) = head.last {
            tasks[last.get()].link.replace(&mut *lock, Some(task));
        } else {
            head.first = Some(task);
        }
        head.last = Some(task);

        queue.replace(&mut *lock, head);
        self.bitmap.write(&mut *lock).set(priority);
    }

    /// Remove the task at the front of the highest-priority non-empty queue
    /// and return it.
    pub(super) fn pop_front_task(
        &self,
        mut lock: CpuLockTokenRefMut<'_, Traits>,
        tasks: &[TaskCb<Traits>],
    ) -> Option<TaskId> {
        let priority = self.bitmap.read(&*lock).find_set()?;

        let queue = &self.queues[priority];
        let mut head = *queue.read(&*lock);

        let Some(task) = head.first else {
            debug_assert!(false, "bitmap and queue {priority} disagree");
            self.bitmap.write(&mut *lock).clear(priority);
            return None;
        };

        head.first = tasks[task.get()].link.replace(&mut *lock, None);
        if head.first.is_none() {
            head.last = None;
            self.bitmap.write(&mut *lock).clear(priority);
        }
        queue.replace(&mut *lock, head);

        Some(task)
    }
}
