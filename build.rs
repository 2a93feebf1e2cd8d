use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=RUSTC");

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_owned());
    let output = Command::new(rustc).arg("--version").output();

    // "rustc 1.80.0 (051478957 2024-07-21)" -> "1.80.0"
    let version = match output {
        Ok(o) if o.status.success() => String::from_utf8(o.stdout)
            .unwrap_or_default()
            .split_whitespace()
            .nth(1)
            .map(str::to_owned)
            .unwrap_or_else(|| "unknown".to_owned()),
        _ => "unknown".to_owned(),
    };

    println!("cargo:rustc-env=ASANA_DISPATCH_RUSTC_VERSION={}", version);
}
