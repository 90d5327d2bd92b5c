tock_registers::register_bitfields! {u64,
    /// The layout shared by `CNTP_CTL_EL0` and `CNTV_CTL_EL0`.
    pub CNT_CTL [
        /// Enables the timer.
        ENABLE OFFSET(0) NUMBITS(1) [],
        /// Masks the timer interrupt.
        IMASK OFFSET(1) NUMBITS(1) [],
        /// The timer condition is met. Read-only.
        ISTATUS OFFSET(2) NUMBITS(1) []
    ]
}

macro_rules! timer_accessors {
    (
        $(#[$ctl_meta:meta])* $ctl:ident: $CtlAccessor:ident,
        $(#[$tval_meta:meta])* $tval:ident: $TvalAccessor:ident,
        $(#[$cval_meta:meta])* $cval:ident: $CvalAccessor:ident $(,)?
    ) => {
        $(#[$ctl_meta])*
        pub const $ctl: $CtlAccessor = $CtlAccessor;
        pub struct $CtlAccessor;

        impl tock_registers::interfaces::Readable for $CtlAccessor {
            type T = u64;
            type R = CNT_CTL::Register;
            sys_reg_read_raw!(u64, $ctl);
        }

        impl tock_registers::interfaces::Writeable for $CtlAccessor {
            type T = u64;
            type R = CNT_CTL::Register;
            sys_reg_write_raw!(u64, $ctl);
        }

        $(#[$tval_meta])*
        pub const $tval: $TvalAccessor = $TvalAccessor;
        pub struct $TvalAccessor;

        impl tock_registers::interfaces::Writeable for $TvalAccessor {
            type T = u64;
            type R = ();
            sys_reg_write_raw!(u64, $tval);
        }

        $(#[$cval_meta])*
        pub const $cval: $CvalAccessor = $CvalAccessor;
        pub struct $CvalAccessor;

        impl tock_registers::interfaces::Readable for $CvalAccessor {
            type T = u64;
            type R = ();
            sys_reg_read_raw!(u64, $cval);
        }

        impl tock_registers::interfaces::Writeable for $CvalAccessor {
            type T = u64;
            type R = ();
            sys_reg_write_raw!(u64, $cval);
        }
    };
}

timer_accessors! {
    /// Counter-timer Physical Timer Control register
    CNTP_CTL_EL0: CntpCtlEl0Accessor,
    /// Counter-timer Physical Timer TimerValue register
    CNTP_TVAL_EL0: CntpTvalEl0Accessor,
    /// Counter-timer Physical Timer CompareValue register
    CNTP_CVAL_EL0: CntpCvalEl0Accessor,
}

timer_accessors! {
    /// Counter-timer Virtual Timer Control register
    CNTV_CTL_EL0: CntvCtlEl0Accessor,
    /// Counter-timer Virtual Timer TimerValue register
    CNTV_TVAL_EL0: CntvTvalEl0Accessor,
    /// Counter-timer Virtual Timer CompareValue register
    CNTV_CVAL_EL0: CntvCvalEl0Accessor,
}
