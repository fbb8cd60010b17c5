use std::env;
use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=Info.plist");

    let out_dir = env::var("OUT_DIR").unwrap();
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();

    // The camera permission prompt on macOS needs NSCameraUsageDescription next to the binary
    let plist_src = Path::new(&manifest_dir).join("Info.plist");
    let plist_dst = Path::new(&out_dir).join("../../../Info.plist");

    if plist_src.exists() {
        if let Err(e) = fs::copy(&plist_src, &plist_dst) {
            println!("cargo:warning=could not copy Info.plist: {}", e);
        }
    }
}
