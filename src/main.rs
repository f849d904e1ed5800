fn main() {
    if let Err(err) = fittrack_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
