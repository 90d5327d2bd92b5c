use core::panic::PanicInfo;
use photon_kernel::console;

use crate::{aarch64, SystemTraits};

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    aarch64::mask_irq();
    console::kernel_panic::<SystemTraits>(format_args!("{info}"))
}
