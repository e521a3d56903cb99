//! regstore binary entry point.

fn main() {
    if let Err(err) = regstore::cli::run() {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}
