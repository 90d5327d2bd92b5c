/// Counter-timer Physical Count register
pub const CNTPCT_EL0: CntpctEl0Accessor = CntpctEl0Accessor;
pub struct CntpctEl0Accessor;

impl tock_registers::interfaces::Readable for CntpctEl0Accessor {
    type T = u64;
    type R = ();
    sys_reg_read_raw!(u64, CNTPCT_EL0);
}

/// Counter-timer Virtual Count register
pub const CNTVCT_EL0: CntvctEl0Accessor = CntvctEl0Accessor;
pub struct CntvctEl0Accessor;

impl tock_registers::interfaces::Readable for CntvctEl0Accessor {
    type T = u64;
    type R = ();
    sys_reg_read_raw!(u64, CNTVCT_EL0);
}
