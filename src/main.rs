fn main() {
    if let Err(err) = chat_transcript::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
