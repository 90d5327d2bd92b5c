//! Memory-mapped register blocks of a GICv2 (GIC-400).
#![allow(non_snake_case)]
use tock_registers::{
    register_bitfields,
    registers::{ReadOnly, ReadWrite, WriteOnly},
};

#[repr(C)]
pub struct GicDistributor {
    /// Distributor Control Register
    pub CTLR: ReadWrite<u32, GICD_CTLR::Register>,
    /// Interrupt Controller Type Register
    pub TYPER: ReadOnly<u32, GICD_TYPER::Register>,
    /// Distributor Implementer Identification Register
    pub IIDR: ReadOnly<u32>,
    _reserved1: [u32; 5],
    _implementation_defined1: [u32; 8],
    _reserved2: [u32; 16],
    /// Interrupt Group Registers
    pub IGROUPR: [ReadWrite<u32>; 32],
    /// Interrupt Set-Enable Registers
    pub ISENABLER: [ReadWrite<u32>; 32],
    /// Interrupt Clear-Enable Registers
    pub ICENABLER: [ReadWrite<u32>; 32],
    /// Interrupt Set-Pending Registers
    pub ISPENDR: [ReadWrite<u32>; 32],
    /// Interrupt Clear-Pending Registers
    pub ICPENDR: [ReadWrite<u32>; 32],
    /// Interrupt Set-Active Registers
    pub ISACTIVER: [ReadWrite<u32>; 32],
    /// Interrupt Clear-Active Registers
    pub ICACTIVER: [ReadWrite<u32>; 32],
    /// Interrupt Priority Registers (byte-accessible)
    pub IPRIORITYR: [ReadWrite<u8>; 1024],
    /// Interrupt Processor Targets Registers
    pub ITARGETSR: [ReadWrite<u32>; 255],
    _reserved3: u32,
    /// Interrupt Configuration Registers
    pub ICFGR: [ReadWrite<u32>; 64],
    _implementation_defined2: [u32; 64],
    /// Non-secure Access Control Registers, optional
    pub NSACR: [ReadWrite<u32>; 64],
    /// Software Generated Interrupt Register
    pub SGIR: WriteOnly<u32, GICD_SGIR::Register>,
    _reserved4: [u32; 3],
    /// SGI Clear-Pending Registers
    pub CPENDSGIR: [ReadWrite<u8>; 16],
    /// SGI Set-Pending Registers
    pub SPENDSGIR: [ReadWrite<u8>; 16],
    _reserved5: [u32; 40],
    _implementation_defined3: [u32; 12],
}

const _: () = assert!(core::mem::size_of::<GicDistributor>() == 0x1000);

#[repr(C)]
pub struct GicCpuInterface {
    /// CPU Interface Control Register
    pub CTLR: ReadWrite<u32, GICC_CTLR::Register>,
    /// Interrupt Priority Mask Register
    pub PMR: ReadWrite<u32>,
    /// Binary Point Register
    pub BPR: ReadWrite<u32>,
    /// Interrupt Acknowledge Register
    pub IAR: ReadWrite<u32>,
    /// End of Interrupt Register
    pub EOIR: ReadWrite<u32>,
    /// Running Priority Register
    pub RPR: ReadWrite<u32>,
    /// Highest Priority Pending Interrupt Register
    pub HPPIR: ReadWrite<u32>,
    /// Aliased Binary Point Register
    pub ABPR: ReadWrite<u32>,
    /// Aliased Interrupt Acknowledge Register
    pub AIAR: ReadWrite<u32>,
    /// Aliased End of Interrupt Register
    pub AEOIR: ReadWrite<u32>,
    /// Aliased Highest Priority Pending Interrupt Register
    pub AHPPIR: ReadWrite<u32>,
}

register_bitfields! {u32,
    pub GICC_CTLR [
        /// Enable for the signaling of Group 1 interrupts by the CPU interface
        /// to the connected processor.
        Enable OFFSET(0) NUMBITS(1) [
            Disable = 0,
            Enable = 1
        ]
    ]
}

register_bitfields! {u32,
    pub GICD_CTLR [
        /// Global enable for forwarding pending interrupts from the Distributor
        /// to the CPU interfaces
        Enable OFFSET(0) NUMBITS(1) [
            Disable = 0,
            Enable = 1
        ]
    ]
}

register_bitfields! {u32,
    pub GICD_TYPER [
        /// Indicates whether the GIC implements the Security Extensions.
        SecurityExtn OFFSET(10) NUMBITS(1) [
            Unimplemented = 0,
            Implemented = 1
        ],

        /// The number of implemented CPU interfaces, minus one.
        CPUNumber OFFSET(5) NUMBITS(3) [],

        /// If ITLinesNumber=N, the maximum number of interrupts is 32(N+1).
        ITLinesNumber OFFSET(0) NUMBITS(5) []
    ]
}

register_bitfields! {u32,
    pub GICD_SGIR [
        /// Determines how the distributor processes the requested SGI.
        TargetListFilter OFFSET(24) NUMBITS(2) [
            TargetList = 0,
            AllOther = 1,
            Myself = 2
        ],

        /// The CPU interfaces to which the distributor forwards the SGI.
        CPUTargetList OFFSET(16) NUMBITS(8) [],

        /// The interrupt ID of the SGI.
        SGIINTID OFFSET(0) NUMBITS(4) []
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoffset::offset_of;

    #[test]
    fn distributor_layout() {
        assert_eq!(offset_of!(GicDistributor, TYPER), 0x004);
        assert_eq!(offset_of!(GicDistributor, IGROUPR), 0x080);
        assert_eq!(offset_of!(GicDistributor, ISENABLER), 0x100);
        assert_eq!(offset_of!(GicDistributor, ICENABLER), 0x180);
        assert_eq!(offset_of!(GicDistributor, ISPENDR), 0x200);
        assert_eq!(offset_of!(GicDistributor, ICPENDR), 0x280);
        assert_eq!(offset_of!(GicDistributor, IPRIORITYR), 0x400);
        assert_eq!(offset_of!(GicDistributor, ITARGETSR), 0x800);
        assert_eq!(offset_of!(GicDistributor, ICFGR), 0xc00);
        assert_eq!(offset_of!(GicDistributor, NSACR), 0xe00);
        assert_eq!(offset_of!(GicDistributor, SGIR), 0xf00);
        assert_eq!(offset_of!(GicDistributor, CPENDSGIR), 0xf10);
        assert_eq!(offset_of!(GicDistributor, SPENDSGIR), 0xf20);
    }

    #[test]
    fn cpu_interface_layout() {
        assert_eq!(offset_of!(GicCpuInterface, PMR), 0x04);
        assert_eq!(offset_of!(GicCpuInterface, BPR), 0x08);
        assert_eq!(offset_of!(GicCpuInterface, IAR), 0x0c);
        assert_eq!(offset_of!(GicCpuInterface, EOIR), 0x10);
        assert_eq!(offset_of!(GicCpuInterface, AHPPIR), 0x28);
    }
}
