// build.rs

fn main() {
    // --- Link against Xlib ---
    // The selection bridge only needs core Xlib (no Xft or fontconfig).
    // pkg-config is tried first; if it cannot find the library we fall back
    // to plain linker flags that work on most distributions.

    println!("cargo:rerun-if-changed=build.rs");

    match pkg_config::probe_library("x11") {
        Ok(_) => {
            eprintln!("pkg-config found x11. Linking configured automatically.");
        }
        Err(e) => {
            eprintln!(
                "pkg-config failed for library 'x11' ({}). Falling back to manual linking.",
                e
            );
            println!("cargo:rustc-link-lib=X11");
            println!("cargo:rustc-link-search=/usr/lib");
            eprintln!("Manual linking flags applied. Ensure the X11 development library is installed.");
        }
    }
}
