/// Counter-timer Frequency register
///
/// Read-only here. Only the highest implemented exception level can write
/// it, and `_start` does so in assembly when entered at EL3.
pub const CNTFRQ_EL0: CntfrqEl0Accessor = CntfrqEl0Accessor;
pub struct CntfrqEl0Accessor;

impl tock_registers::interfaces::Readable for CntfrqEl0Accessor {
    type T = u64;
    type R = ();
    sys_reg_read_raw!(u64, CNTFRQ_EL0);
}
