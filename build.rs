fn main() {
    // RELEASE_VERSION is set by release builds; otherwise use the crate version
    let release = std::env::var("RELEASE_VERSION").ok();
    let version = release
        .clone()
        .unwrap_or_else(|| std::env::var("CARGO_PKG_VERSION").unwrap_or_default());

    let profile = std::env::var("PROFILE").unwrap_or_default();
    let app_version = if profile == "debug" && release.is_none() {
        format!("{version}-dev")
    } else {
        version
    };

    println!("cargo:rerun-if-env-changed=RELEASE_VERSION");
    println!("cargo:rustc-env=APP_VERSION={app_version}");
}
