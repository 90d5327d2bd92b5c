#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
photon_port_zynqmp::use_startup!();

#[cfg(not(target_os = "none"))]
fn main() {
    println!(
        "This image only runs on the board. Build it with \
        `--target aarch64-unknown-none-softfloat`."
    );
}
