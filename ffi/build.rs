//! Generates `include/todo_sync.h` from the `extern "C"` surface.

use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src");

    let Ok(crate_dir) = std::env::var("CARGO_MANIFEST_DIR") else {
        println!("cargo:warning=CARGO_MANIFEST_DIR not set, skipping header generation");
        return;
    };
    let include_dir = PathBuf::from(&crate_dir).join("include");

    let bindings = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("TODO_SYNC_H")
        .with_cpp_compat(true)
        .generate();

    match bindings {
        Ok(bindings) => {
            if let Err(err) = std::fs::create_dir_all(&include_dir) {
                println!("cargo:warning=cannot create {}: {err}", include_dir.display());
                return;
            }
            bindings.write_to_file(include_dir.join("todo_sync.h"));
        }
        // Best effort: the library builds without a header.
        Err(err) => println!("cargo:warning=cbindgen failed: {err}"),
    }
}
