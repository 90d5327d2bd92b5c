/// Vector Base Address Register (EL1)
pub const VBAR_EL1: VbarEl1Accessor = VbarEl1Accessor;
pub struct VbarEl1Accessor;

impl tock_registers::interfaces::Writeable for VbarEl1Accessor {
    type T = u64;
    type R = ();
    sys_reg_write_raw!(u64, VBAR_EL1);
}
