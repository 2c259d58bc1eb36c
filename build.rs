// Emits VERGEN_BUILD_DATE and VERGEN_CARGO_TARGET_TRIPLE for `--version`.
fn main() {
    use vergen::{BuildBuilder, CargoBuilder, Emitter};

    let mut emitter = Emitter::default();

    if let Ok(build) = BuildBuilder::default().build_date(true).build() {
        let _ = emitter.add_instructions(&build);
    }
    if let Ok(cargo) = CargoBuilder::default().target_triple(true).build() {
        let _ = emitter.add_instructions(&cargo);
    }

    if let Err(e) = emitter.emit() {
        eprintln!("version metadata skipped: {e}");
    }
}
