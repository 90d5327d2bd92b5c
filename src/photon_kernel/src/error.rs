//! Error types
//!
//! Every operation has its own error type, listing only the codes it can
//! actually return. Each of them converts losslessly into [`ResultCode`],
//! and into the error type of any operation that calls it.
use core::fmt;

/// All result codes (including success) that kernel operations can report.
///
/// Failures are negative.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i8)]
pub enum ResultCode {
    /// The operation was successful.
    Success = 0,
    /// The current context disallows the operation, e.g., because CPU Lock
    /// is already active.
    BadContext = -25,
    /// The task ID is out of range or refers to an unused slot.
    BadId = -18,
    /// A target object is in a state that disallows the operation.
    BadObjectState = -41,
    /// The task priority is outside `0..NUM_PRIORITY_LEVELS`.
    InvalidPriority = -17,
    /// Every non-reserved slot of the process table is occupied.
    TableFull = -43,
    /// The interrupt line is not implemented by the interrupt controller
    /// or doesn't support the operation.
    InvalidLine = -19,
    /// The timer already has a pending timeout.
    AlreadyArmed = -42,
}

impl ResultCode {
    /// The variant name.
    ///
    /// ```
    /// use photon_kernel::ResultCode;
    /// assert_eq!(ResultCode::TableFull.as_str(), "TableFull");
    /// ```
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::BadContext => "BadContext",
            Self::BadId => "BadId",
            Self::BadObjectState => "BadObjectState",
            Self::InvalidPriority => "InvalidPriority",
            Self::TableFull => "TableFull",
            Self::InvalidLine => "InvalidLine",
            Self::AlreadyArmed => "AlreadyArmed",
        }
    }

    #[inline]
    pub fn is_err(self) -> bool {
        (self as i8) < 0
    }

    #[inline]
    pub fn is_ok(self) -> bool {
        !self.is_err()
    }
}

impl fmt::Debug for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Define an error type whose variants are a subset of [`ResultCode`].
///
/// `enum Name: A, B { .. }` also implements `From<A>` and `From<B>` for
/// `Name`; every variant of `A` and `B` must be present in `Name`. This is
/// done by the helper macro named after each error type, which expands to
/// a `match` over that type's variants.
macro_rules! define_error {
    (
        mod $test_mod:ident {}
        $( #[$meta:meta] )*
        pub enum $name:ident $(: $($subset:ident),+)? {
            $(
                $( #[$vmeta:meta] )*
                $vname:ident
            ),+ $(,)?
        }
    ) => {
        $( #[$meta] )*
        ///
        /// See [`ResultCode`] for all result codes.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(i8)]
        pub enum $name {
            $(
                $( #[$vmeta] )*
                $vname = ResultCode::$vname as i8
            ),+
        }

        impl From<$name> for ResultCode {
            #[inline]
            fn from(x: $name) -> Self {
                match x {
                    $( $name::$vname => Self::$vname, )+
                }
            }
        }

        impl From<Result<(), $name>> for ResultCode {
            #[inline]
            fn from(x: Result<(), $name>) -> Self {
                x.map_or_else(Self::from, |()| Self::Success)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Debug::fmt(&ResultCode::from(*self), f)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(&ResultCode::from(*self), f)
            }
        }

        $($( $subset!(impl From<_> for $name); )+)?

        #[allow(unused_macros)]
        macro_rules! $name {
            (impl From<_> for $superset:ty) => {
                impl From<$name> for $superset {
                    #[inline]
                    fn from(x: $name) -> Self {
                        match x {
                            $( $name::$vname => Self::$vname, )+
                        }
                    }
                }
            };
        }

        #[cfg(test)]
        mod $test_mod {
            use super::*;

            #[test]
            fn conversions_keep_the_code() {
                $(
                    let code = ResultCode::from($name::$vname);
                    assert_eq!(code, ResultCode::$vname);
                    assert_eq!(code as i8, $name::$vname as i8);
                    assert_eq!(ResultCode::from(Err($name::$vname)), code);
                )+
                assert_eq!(ResultCode::from(Ok::<(), $name>(())), ResultCode::Success);
            }
        }
    };
}

define_error! {
    mod bad_context_error {}
    /// Error type for operations that only fail when CPU Lock is already
    /// active, such as [`Kernel::yield_now`] and [`Kernel::get_uptime_ns`].
    ///
    /// [`Kernel::yield_now`]: crate::Kernel::yield_now
    /// [`Kernel::get_uptime_ns`]: crate::Kernel::get_uptime_ns
    pub enum BadContextError {
        /// CPU Lock is active.
        BadContext,
    }
}

define_error! {
    mod create_task_error {}
    /// Error type for [`Kernel::create_task`].
    ///
    /// [`Kernel::create_task`]: crate::Kernel::create_task
    pub enum CreateTaskError: BadContextError {
        /// CPU Lock is active.
        BadContext,
        /// The priority is outside `0..NUM_PRIORITY_LEVELS`.
        InvalidPriority,
        /// There is no Unused slot in the process table.
        TableFull,
    }
}

define_error! {
    mod exit_task_error {}
    /// Error type for [`Kernel::exit_current`] and
    /// [`Kernel::block_current`].
    ///
    /// [`Kernel::exit_current`]: crate::Kernel::exit_current
    /// [`Kernel::block_current`]: crate::Kernel::block_current
    pub enum ExitTaskError: BadContextError {
        /// CPU Lock is active, or the caller is an interrupt handler.
        BadContext,
        /// The current task is the idle task.
        BadObjectState,
    }
}

define_error! {
    mod bad_id_error {}
    /// Error type for read-only queries targeting a process table slot, such
    /// as [`Kernel::task_state`].
    ///
    /// [`Kernel::task_state`]: crate::Kernel::task_state
    pub enum BadIdError: BadContextError {
        /// CPU Lock is active.
        BadContext,
        /// The slot index is outside the process table.
        BadId,
    }
}

define_error! {
    mod task_ref_error {}
    /// Error type for operations targeting a task by ID, such as
    /// [`Kernel::unblock`] and [`Kernel::reap`].
    ///
    /// [`Kernel::unblock`]: crate::Kernel::unblock
    /// [`Kernel::reap`]: crate::Kernel::reap
    pub enum TaskRefError: BadContextError, BadIdError {
        /// CPU Lock is active.
        BadContext,
        /// The task ID refers to an Unused slot.
        BadId,
        /// The task is not in the state the operation requires.
        BadObjectState,
    }
}

define_error! {
    mod interrupt_line_error {}
    /// Error type for [`Gic`] operations that take an interrupt line.
    ///
    /// [`Gic`]: crate::Gic
    pub enum InterruptLineError {
        /// The line is not implemented, or doesn't support the operation.
        InvalidLine,
    }
}

define_error! {
    mod register_interrupt_handler_error {}
    /// Error type for [`Kernel::register_interrupt_handler`].
    ///
    /// [`Kernel::register_interrupt_handler`]: crate::Kernel::register_interrupt_handler
    pub enum RegisterInterruptHandlerError: BadContextError, InterruptLineError {
        /// CPU Lock is active.
        BadContext,
        /// The line is not implemented by the interrupt controller.
        InvalidLine,
    }
}

define_error! {
    mod boot_error {}
    /// Error type for [`Kernel::boot`].
    ///
    /// [`Kernel::boot`]: crate::Kernel::boot
    pub enum BootError: BadContextError, InterruptLineError, RegisterInterruptHandlerError {
        /// CPU Lock is active.
        BadContext,
        /// The timer's interrupt line is not implemented by the interrupt
        /// controller.
        InvalidLine,
    }
}

define_error! {
    mod set_timeout_error {}
    /// Error type for [`Kernel::set_timeout`].
    ///
    /// [`Kernel::set_timeout`]: crate::Kernel::set_timeout
    pub enum SetTimeoutError: BadContextError {
        /// CPU Lock is active.
        BadContext,
        /// A timeout is already pending. Cancel it first, or use
        /// [`Kernel::rearm_timeout`].
        ///
        /// [`Kernel::rearm_timeout`]: crate::Kernel::rearm_timeout
        AlreadyArmed,
    }
}
