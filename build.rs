fn main() {
    // Writes $OUT_DIR/built.rs, pulled in by `stocks_guru::built_info`.
    built::write_built_file().expect("Failed to generate build info");
}
