fn main() {
    let now = time::OffsetDateTime::now_utc();
    let stamp_fmt = time::format_description::parse("[year]-[month]-[day] [hour]:[minute]")
        .expect("valid build stamp format");

    let stamp = std::env::var("SCENE_MIRROR_BUILD_STAMP")
        .unwrap_or_else(|_| now.format(&stamp_fmt).unwrap_or_else(|_| "unknown".to_string()));

    println!("cargo:rustc-env=SCENE_MIRROR_BUILD_STAMP={}", stamp);
    println!("cargo:rerun-if-env-changed=SCENE_MIRROR_BUILD_STAMP");
}
