tock_registers::register_bitfields! {u64,
    pub CurrentEL [
        /// The current exception level.
        EL OFFSET(2) NUMBITS(2) [
            EL0 = 0,
            EL1 = 1,
            EL2 = 2,
            EL3 = 3
        ]
    ]
}

/// Current Exception Level
pub const CURRENT_EL: CurrentElAccessor = CurrentElAccessor;
pub struct CurrentElAccessor;

impl tock_registers::interfaces::Readable for CurrentElAccessor {
    type T = u64;
    type R = CurrentEL::Register;
    sys_reg_read_raw!(u64, CurrentEL);
}
