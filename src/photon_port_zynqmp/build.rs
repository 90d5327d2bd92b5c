use std::env;

fn main() {
    println!("cargo:rerun-if-changed=link.x");

    // The linker script only applies to the bare-metal build
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("none") {
        let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
        println!("cargo:rustc-link-search={manifest_dir}");
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
    }
}
