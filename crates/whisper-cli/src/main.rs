mod cli;

fn main() {
    let code = {
        let _logging = whisper_core::logging::init();
        match cli::run() {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("{e:#}"); // pretty anyhow chain
                1
            }
        }
    };
    std::process::exit(code);
}
