//! Tasks
use arrayvec::ArrayString;
use core::{cell::UnsafeCell, fmt};

use crate::{
    console,
    error::{BadContextError, BadIdError, CreateTaskError, ExitTaskError, TaskRefError},
    klock::{self, CpuLockCell, CpuLockGuard, CpuLockTokenRefMut},
    utils::Init,
    Kernel, KernelTraits, Priority, PortThreading,
};

#[doc(hidden)]
pub mod readyqueue;
use self::readyqueue::BitmapQueue;

/// The capacity of the process table, including the idle task's slot.
pub const MAX_TASKS: usize = 128;

/// The number of task priority levels. `0` is the highest priority.
pub const NUM_PRIORITY_LEVELS: usize = 16;

/// The size of each task's stack region in bytes.
pub const TASK_STACK_SIZE: usize = 8192;

/// The capacity of a task name in bytes.
pub const TASK_NAME_LEN: usize = 32;

/// The name of the idle task.
const IDLE_TASK_NAME: &str = "idle_task";

/// A task's name. Longer names are truncated on a character boundary.
pub type TaskName = ArrayString<TASK_NAME_LEN>;

/// The entry point of a task.
pub type TaskEntry = extern "C" fn();

/// Identifies a task by the index of its slot in the process table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(usize);

impl TaskId {
    /// The idle task, which permanently occupies slot 0.
    pub const IDLE: Self = Self(0);

    /// Construct a `TaskId` from a slot index. Return `None` if it's outside
    /// the process table.
    pub const fn new(slot: usize) -> Option<Self> {
        if slot < MAX_TASKS {
            Some(Self(slot))
        } else {
            None
        }
    }

    /// Get the slot index.
    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl Init for TaskId {
    const INIT: Self = Self::IDLE;
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Task state machine
///
/// ```text
/// Unused ──▶ Created ──▶ Ready ◀──▶ Running ──▶ Zombie ──▶ Unused
///                          ▲           │
///                          └─ Blocked ◀┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskSt {
    /// The slot is free.
    Unused,
    /// The slot has been claimed but the task isn't schedulable yet.
    Created,
    /// The task is in a ready queue.
    Ready,
    /// The task owns the processor.
    Running,
    /// The task waits for [`Kernel::unblock`].
    Blocked,
    /// The task has exited and waits for [`Kernel::reap`].
    Zombie,
}

impl Init for TaskSt {
    const INIT: Self = Self::Unused;
}

/// A region of memory reserved as a task's stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackRegion {
    /// The lowest address of the region.
    pub base: usize,
    /// The size of the region in bytes.
    pub size: usize,
}

impl StackRegion {
    /// The initial stack pointer of a full-descending stack.
    #[inline]
    pub const fn top(&self) -> usize {
        self.base + self.size
    }
}

#[repr(C, align(16))]
struct TaskStack([u8; TASK_STACK_SIZE]);

/// The fixed pool of task stacks. Slot `i` of the process table always uses
/// stack `i`, so a slot's stack returns to the pool when the slot is reaped.
pub struct StackPool {
    stacks: UnsafeCell<[TaskStack; MAX_TASKS]>,
}

// Safety: The pool only hands out addresses. The memory is used by the task
//         owning the slot.
unsafe impl Sync for StackPool {}

impl StackPool {
    pub const fn new() -> Self {
        Self {
            stacks: UnsafeCell::new([const { TaskStack([0; TASK_STACK_SIZE]) }; MAX_TASKS]),
        }
    }

    /// Get the stack region assigned to `task`.
    pub fn region(&self, task: TaskId) -> StackRegion {
        let base = self.stacks.get() as *mut TaskStack;
        StackRegion {
            base: base.wrapping_add(task.get()) as usize,
            size: TASK_STACK_SIZE,
        }
    }
}

/// *Task control block* - the state data of a task.
pub(crate) struct TaskCb<Traits: PortThreading> {
    /// The saved execution context. Only touched inside a CPU Lock section.
    context: UnsafeCell<Traits::TaskContext>,

    pub(crate) st: CpuLockCell<Traits, TaskSt>,

    name: CpuLockCell<Traits, TaskName>,

    priority: CpuLockCell<Traits, Priority>,

    /// The number of ticks left before the scheduler reconsiders.
    quantum_remaining: CpuLockCell<Traits, u32>,

    /// The number of ticks charged to this task so far.
    total_runtime: CpuLockCell<Traits, u64>,

    stack: CpuLockCell<Traits, Option<StackRegion>>,

    /// The next task in the same ready queue.
    pub(super) link: CpuLockCell<Traits, Option<TaskId>>,
}

impl<Traits: PortThreading> Init for TaskCb<Traits> {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self {
        context: Init::INIT,
        st: Init::INIT,
        name: Init::INIT,
        priority: Init::INIT,
        quantum_remaining: Init::INIT,
        total_runtime: Init::INIT,
        stack: Init::INIT,
        link: Init::INIT,
    };
}

/// A snapshot of a task's control block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: TaskId,
    pub name: TaskName,
    pub state: TaskSt,
    pub priority: Priority,
    pub quantum_remaining: u32,
    pub total_runtime: u64,
    pub stack: Option<StackRegion>,
}

/// The scheduler's portion of the kernel state.
pub(crate) struct SchedulerState<Traits: PortThreading> {
    /// The process table.
    tasks: [TaskCb<Traits>; MAX_TASKS],

    ready_queue: BitmapQueue<Traits>,

    /// The task currently owning the processor.
    running_task: CpuLockCell<Traits, TaskId>,

    /// Set when a scheduling decision was requested in an interrupt handler.
    /// Consumed by the IRQ dispatcher after end-of-interrupt.
    dispatch_pending: CpuLockCell<Traits, bool>,
}

impl<Traits: PortThreading> Init for SchedulerState<Traits> {
    const INIT: Self = Self {
        tasks: Init::INIT,
        ready_queue: Init::INIT,
        running_task: Init::INIT,
        dispatch_pending: Init::INIT,
    };
}

impl<Traits: PortThreading> fmt::Debug for SchedulerState<Traits> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SchedulerState")
            .field("running_task", &self.running_task)
            .field("ready_queue", &self.ready_queue)
            .field("dispatch_pending", &self.dispatch_pending)
            .finish_non_exhaustive()
    }
}

impl<Traits: PortThreading> SchedulerState<Traits> {
    fn task_cb(&self, task: TaskId) -> &TaskCb<Traits> {
        &self.tasks[task.get()]
    }

    /// Transition `task` into the Ready state and put it at the back of its
    /// queue.
    fn make_ready(&self, mut lock: CpuLockTokenRefMut<'_, Traits>, task: TaskId) {
        let task_cb = self.task_cb(task);
        task_cb.st.replace(&mut *lock, TaskSt::Ready);

        let priority = *task_cb.priority.read(&*lock) as usize;
        self.ready_queue
            .push_back_task(lock, &self.tasks, task, priority);
    }

    pub(crate) fn take_dispatch_pending(&self, mut lock: CpuLockTokenRefMut<'_, Traits>) -> bool {
        self.dispatch_pending.replace(&mut *lock, false)
    }

    pub(crate) fn set_dispatch_pending(&self, mut lock: CpuLockTokenRefMut<'_, Traits>) {
        self.dispatch_pending.replace(&mut *lock, true);
    }
}

fn truncated_name(name: &str) -> TaskName {
    let mut out = TaskName::new();
    for ch in name.chars() {
        if out.try_push(ch).is_err() {
            break;
        }
    }
    out
}

/// These associate functions implement the scheduler.
impl<Traits: KernelTraits> Kernel<Traits> {
    /// Reset the process table and make the caller the idle task.
    ///
    /// [`Kernel::boot`] calls this; it's exposed for bring-up code that
    /// drives the components one by one.
    pub fn init_scheduler(&self) -> Result<(), BadContextError> {
        let mut lock = klock::lock_cpu::<Traits>()?;
        self.init_scheduler_locked(lock.borrow_mut());
        Ok(())
    }

    pub(crate) fn init_scheduler_locked(&self, mut lock: CpuLockTokenRefMut<'_, Traits>) {
        let sched = &self.scheduler;

        for task_cb in sched.tasks.iter() {
            task_cb.st.replace(&mut *lock, TaskSt::Unused);
            task_cb.name.write(&mut *lock).clear();
            task_cb.priority.replace(&mut *lock, 0);
            task_cb.quantum_remaining.replace(&mut *lock, 0);
            task_cb.total_runtime.replace(&mut *lock, 0);
            task_cb.stack.replace(&mut *lock, None);
            task_cb.link.replace(&mut *lock, None);
        }
        sched.ready_queue.reset(lock.borrow_mut());

        let idle = sched.task_cb(TaskId::IDLE);
        idle.st.replace(&mut *lock, TaskSt::Running);
        idle.name.replace(&mut *lock, truncated_name(IDLE_TASK_NAME));
        idle.priority
            .replace(&mut *lock, (NUM_PRIORITY_LEVELS - 1) as Priority);
        idle.quantum_remaining
            .replace(&mut *lock, Traits::QUANTUM_TICKS);

        sched.running_task.replace(&mut *lock, TaskId::IDLE);
        sched.dispatch_pending.replace(&mut *lock, false);

        log::info!("scheduler initialized ({MAX_TASKS} slots, {NUM_PRIORITY_LEVELS} levels)");
    }

    /// Create a task and put it in the Ready state. The task starts running
    /// the next time the scheduler picks it.
    pub fn create_task(
        &self,
        name: &str,
        entry: TaskEntry,
        priority: Priority,
    ) -> Result<TaskId, CreateTaskError> {
        let mut lock = klock::lock_cpu::<Traits>()?;
        let sched = &self.scheduler;

        if priority as usize >= NUM_PRIORITY_LEVELS {
            return Err(CreateTaskError::InvalidPriority);
        }

        let Some(task) = (1..MAX_TASKS)
            .map(TaskId)
            .find(|&task| *sched.task_cb(task).st.read(&*lock) == TaskSt::Unused)
        else {
            log::warn!("process table full; can't create {name:?}");
            return Err(CreateTaskError::TableFull);
        };

        let task_cb = sched.task_cb(task);
        task_cb.st.replace(&mut *lock, TaskSt::Created);
        task_cb.name.replace(&mut *lock, truncated_name(name));
        task_cb.priority.replace(&mut *lock, priority);
        task_cb
            .quantum_remaining
            .replace(&mut *lock, Traits::QUANTUM_TICKS);
        task_cb.total_runtime.replace(&mut *lock, 0);

        let stack = self.stacks.region(task);
        task_cb.stack.replace(&mut *lock, Some(stack));

        // Safety: CPU Lock active, and the task isn't running
        Traits::initialize_context(unsafe { &mut *task_cb.context.get() }, entry, stack);

        sched.make_ready(lock.borrow_mut(), task);

        log::debug!("created task {task} ({name:?}) at priority {priority}");

        Ok(task)
    }

    /// Relinquish the rest of the current task's quantum.
    ///
    /// In an interrupt handler, the scheduling decision is deferred until the
    /// handler completes.
    pub fn yield_now(&self) -> Result<(), BadContextError> {
        let lock = klock::lock_cpu::<Traits>()?;
        self.schedule(lock);
        Ok(())
    }

    /// The scheduler's tick hook. Charges one tick to the running task and
    /// calls the scheduler when its quantum runs out.
    ///
    /// The timer interrupt handler calls this on every scheduling tick.
    pub fn tick(&self) -> Result<(), BadContextError> {
        let mut lock = klock::lock_cpu::<Traits>()?;
        if self.charge_tick(lock.borrow_mut()) {
            self.schedule(lock);
        }
        Ok(())
    }

    /// Charge one tick to the running task. Return `true` if the scheduler
    /// should run.
    pub(crate) fn charge_tick(&self, mut lock: CpuLockTokenRefMut<'_, Traits>) -> bool {
        let sched = &self.scheduler;
        let running = *sched.running_task.read(&*lock);
        let task_cb = sched.task_cb(running);

        *task_cb.total_runtime.write(&mut *lock) += 1;

        let quantum = task_cb.quantum_remaining.write(&mut *lock);
        *quantum = quantum.saturating_sub(1);
        let expired = *quantum == 0;
        if expired {
            *quantum = Traits::QUANTUM_TICKS;
        }

        // Idle gives way at the next tick boundary
        expired || (running == TaskId::IDLE && sched.ready_queue.has_ready_task(lock))
    }

    /// Run the scheduler now, or mark it pending in an interrupt handler.
    pub(crate) fn schedule(&self, mut lock: CpuLockGuard<Traits>) {
        if Traits::is_interrupt_context() {
            self.scheduler.set_dispatch_pending(lock.borrow_mut());
            return;
        }
        self.dispatch(lock);
    }

    /// Choose the next task and hand the processor over to it. Returns when
    /// the current task is resumed (possibly immediately, if it stays).
    pub(crate) fn dispatch(&self, mut lock: CpuLockGuard<Traits>) {
        let Some((prev, next)) = self.choose_next_running_task(lock.borrow_mut()) else {
            return;
        };

        log::trace!("dispatch: {prev} -> {next}");

        let prev_context = self.scheduler.task_cb(prev).context.get();
        let next_context = self.scheduler.task_cb(next).context.get();

        // Safety: CPU Lock active. `choose_next_running_task` validated
        //         `next_context`, and `prev != next`.
        unsafe { Traits::switch_context(prev_context, next_context) };

        // We are back in `prev`. Leaving CPU Lock re-enables preemption.
        drop(lock);
    }

    /// Update the task states for the next scheduling decision. Return the
    /// outgoing and incoming tasks if a handover is needed.
    fn choose_next_running_task(
        &self,
        mut lock: CpuLockTokenRefMut<'_, Traits>,
    ) -> Option<(TaskId, TaskId)> {
        let sched = &self.scheduler;
        let prev = *sched.running_task.read(&*lock);
        let prev_st = *sched.task_cb(prev).st.read(&*lock);

        // A task that is still runnable competes with everything else from
        // the back of its queue.
        if prev != TaskId::IDLE && prev_st == TaskSt::Running {
            sched.make_ready(lock.borrow_mut(), prev);
        }

        let next = sched
            .ready_queue
            .pop_front_task(lock.borrow_mut(), &sched.tasks)
            .unwrap_or(TaskId::IDLE);

        let next_cb = sched.task_cb(next);

        if next == prev {
            next_cb.st.replace(&mut *lock, TaskSt::Running);
            return None;
        }

        // Safety: CPU Lock active, and `next` isn't running
        if !Traits::is_context_valid(unsafe { &*next_cb.context.get() }) {
            console::kernel_panic::<Traits>(format_args!(
                "task {next} has a corrupted context"
            ));
        }

        // `prev` keeps Blocked/Zombie. Idle is never queued.
        if prev == TaskId::IDLE {
            sched.task_cb(prev).st.replace(&mut *lock, TaskSt::Ready);
        }

        next_cb.st.replace(&mut *lock, TaskSt::Running);
        next_cb
            .quantum_remaining
            .replace(&mut *lock, Traits::QUANTUM_TICKS);
        sched.running_task.replace(&mut *lock, next);

        Some((prev, next))
    }

    /// Move the current task to the Blocked state and run another task. It
    /// stays blocked until [`Self::unblock`] is called for it.
    pub fn block_current(&self) -> Result<(), ExitTaskError> {
        self.retire_current(TaskSt::Blocked)
    }

    /// Terminate the current task. Its slot is released by [`Self::reap`].
    ///
    /// On a real port this doesn't return because a Zombie task is never
    /// resumed.
    pub fn exit_current(&self) -> Result<(), ExitTaskError> {
        self.retire_current(TaskSt::Zombie)
    }

    fn retire_current(&self, st: TaskSt) -> Result<(), ExitTaskError> {
        if Traits::is_interrupt_context() {
            return Err(ExitTaskError::BadContext);
        }

        let mut lock = klock::lock_cpu::<Traits>()?;
        let sched = &self.scheduler;
        let running = *sched.running_task.read(&*lock);

        if running == TaskId::IDLE {
            return Err(ExitTaskError::BadObjectState);
        }

        debug_assert_eq!(*sched.task_cb(running).st.read(&*lock), TaskSt::Running);
        sched.task_cb(running).st.replace(&mut *lock, st);
        log::debug!("task {running} -> {st:?}");

        self.dispatch(lock);
        Ok(())
    }

    /// Make a Blocked task Ready again. The task is put at the back of its
    /// priority's queue.
    ///
    /// If it outranks the running task, it preempts it: right away in a
    /// task, or after end-of-interrupt when called by an interrupt handler.
    pub fn unblock(&self, task: TaskId) -> Result<(), TaskRefError> {
        let mut lock = klock::lock_cpu::<Traits>()?;
        let sched = &self.scheduler;

        match *sched.task_cb(task).st.read(&*lock) {
            TaskSt::Unused => return Err(TaskRefError::BadId),
            TaskSt::Blocked => {}
            _ => return Err(TaskRefError::BadObjectState),
        }

        sched.make_ready(lock.borrow_mut(), task);

        let running = *sched.running_task.read(&*lock);
        let preempt = running == TaskId::IDLE
            || *sched.task_cb(task).priority.read(&*lock)
                < *sched.task_cb(running).priority.read(&*lock);
        if preempt {
            log::trace!("task {task} preempts task {running}");
            self.schedule(lock);
        }
        Ok(())
    }

    /// Release the slot and the stack region of a Zombie task.
    pub fn reap(&self, task: TaskId) -> Result<(), TaskRefError> {
        let mut lock = klock::lock_cpu::<Traits>()?;
        let task_cb = self.scheduler.task_cb(task);

        match *task_cb.st.read(&*lock) {
            TaskSt::Unused => return Err(TaskRefError::BadId),
            TaskSt::Zombie => {}
            _ => return Err(TaskRefError::BadObjectState),
        }

        task_cb.st.replace(&mut *lock, TaskSt::Unused);
        task_cb.stack.replace(&mut *lock, None);
        task_cb.name.write(&mut *lock).clear();
        debug_assert!(task_cb.link.read(&*lock).is_none());

        // Forget the old context so that a stale slot can never be resumed
        // Safety: CPU Lock active, and a Zombie task is never running
        unsafe { *task_cb.context.get() = Init::INIT };

        log::debug!("reaped task {task}");
        Ok(())
    }

    /// Get the task currently owning the processor.
    pub fn current_task(&self) -> Result<TaskId, BadContextError> {
        let lock = klock::lock_cpu::<Traits>()?;
        Ok(*self.scheduler.running_task.read(&*lock))
    }

    /// Get the state of the task in `slot`.
    pub fn task_state(&self, slot: usize) -> Result<TaskSt, BadIdError> {
        let task = TaskId::new(slot).ok_or(BadIdError::BadId)?;
        let lock = klock::lock_cpu::<Traits>()?;
        Ok(*self.scheduler.task_cb(task).st.read(&*lock))
    }

    /// Get a snapshot of the task in `slot`.
    pub fn task_info(&self, slot: usize) -> Result<TaskInfo, BadIdError> {
        let task = TaskId::new(slot).ok_or(BadIdError::BadId)?;
        let lock = klock::lock_cpu::<Traits>()?;
        let task_cb = self.scheduler.task_cb(task);
        Ok(TaskInfo {
            id: task,
            name: *task_cb.name.read(&*lock),
            state: *task_cb.st.read(&*lock),
            priority: *task_cb.priority.read(&*lock),
            quantum_remaining: *task_cb.quantum_remaining.read(&*lock),
            total_runtime: *task_cb.total_runtime.read(&*lock),
            stack: *task_cb.stack.read(&*lock),
        })
    }

    /// Log a line for every slot in use.
    pub fn dump_tasks(&self) -> Result<(), BadContextError> {
        let lock = klock::lock_cpu::<Traits>()?;
        let running = *self.scheduler.running_task.read(&*lock);
        log::info!("{:>4} {:<32} {:<8} {:>4} {:>10}", "ID", "NAME", "STATE", "PRIO", "RUNTIME");
        for (i, task_cb) in self.scheduler.tasks.iter().enumerate() {
            let st = *task_cb.st.read(&*lock);
            if st == TaskSt::Unused {
                continue;
            }
            log::info!(
                "{:>4} {:<32} {:<8} {:>4} {:>10}{}",
                i,
                task_cb.name.read(&*lock).as_str(),
                // `{:?}` ignores width, so go through a `&str`
                st_name(st),
                task_cb.priority.read(&*lock),
                task_cb.total_runtime.read(&*lock),
                if TaskId(i) == running { " *" } else { "" },
            );
        }
        Ok(())
    }
}

fn st_name(st: TaskSt) -> &'static str {
    match st {
        TaskSt::Unused => "Unused",
        TaskSt::Created => "Created",
        TaskSt::Ready => "Ready",
        TaskSt::Running => "Running",
        TaskSt::Blocked => "Blocked",
        TaskSt::Zombie => "Zombie",
    }
}
