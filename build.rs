// Captures the build target and compiler version for `codeferry version`.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    emit("TARGET", env::var("TARGET").unwrap_or_default());
    emit("RUSTC_VERSION", rustc_version());
}

fn emit(key: &str, value: String) {
    println!("cargo:rustc-env={key}={value}");
}

fn rustc_version() -> String {
    // Honor the RUSTC override Cargo sets for custom toolchains.
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|v| v.trim().trim_start_matches("rustc ").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
