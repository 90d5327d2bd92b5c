use photon_kernel::Init;

/// `PortThreading::TaskContext` of this port: the callee-saved state of a
/// suspended task, in the order the context switch routine stores it.
///
/// The caller-saved registers, `ELR_EL1`, and `SPSR_EL1` of an interrupted
/// task are on its own stack, pushed by the IRQ entry.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct TaskContext {
    /// `x19`–`x28`
    pub x19_x28: [u64; 10],
    /// `x29` (frame pointer)
    pub fp: u64,
    /// `x30` (link register). The context resumes here.
    pub lr: u64,
    pub sp: u64,
    /// The IRQ nesting depth when the task was suspended. `0` means it's
    /// suspended in the task context.
    pub irq_depth: u64,
}

impl Init for TaskContext {
    const INIT: Self = Self {
        x19_x28: [0; 10],
        fp: 0,
        lr: 0,
        sp: 0,
        irq_depth: 0,
    };
}

impl TaskContext {
    /// A context is resumable only if it has a return address and a 16-byte
    /// aligned stack pointer.
    pub fn is_resumable(&self) -> bool {
        self.lr != 0 && self.sp != 0 && self.sp % 16 == 0
    }
}
