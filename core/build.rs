fn main() {
    let build_time =
        std::env::var("BUILD_TIME").unwrap_or_else(|_| chrono::Utc::now().to_rfc3339());
    println!("cargo:rustc-env=BUILD_TIME={}", build_time);
}
