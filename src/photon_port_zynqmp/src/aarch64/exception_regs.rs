/// Exception Syndrome Register (EL1)
pub const ESR_EL1: EsrEl1Accessor = EsrEl1Accessor;
pub struct EsrEl1Accessor;

impl tock_registers::interfaces::Readable for EsrEl1Accessor {
    type T = u64;
    type R = ();
    sys_reg_read_raw!(u64, ESR_EL1);
}

/// Exception Link Register (EL1)
pub const ELR_EL1: ElrEl1Accessor = ElrEl1Accessor;
pub struct ElrEl1Accessor;

impl tock_registers::interfaces::Readable for ElrEl1Accessor {
    type T = u64;
    type R = ();
    sys_reg_read_raw!(u64, ELR_EL1);
}

/// Fault Address Register (EL1)
pub const FAR_EL1: FarEl1Accessor = FarEl1Accessor;
pub struct FarEl1Accessor;

impl tock_registers::interfaces::Readable for FarEl1Accessor {
    type T = u64;
    type R = ();
    sys_reg_read_raw!(u64, FAR_EL1);
}
