fn main() {
    if let Err(error) = hypha_sidebar_lib::run() {
        eprintln!("hypha-sidebar: {:#}", error);
        std::process::exit(1);
    }
}
