use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=ROCM_PATH");

    // Only the rocm feature links the HIP runtime; the default build
    // runs against the host shim and needs no ROCm installation.
    if env::var_os("CARGO_FEATURE_ROCM").is_some() {
        let rocm_path = env::var("ROCM_PATH").unwrap_or_else(|_| "/opt/rocm".to_string());
        println!("cargo:rustc-link-search=native={}/lib", rocm_path);
        println!("cargo:rustc-link-lib=dylib=amdhip64");
    }
}
