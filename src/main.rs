fn main() {
    if let Err(err) = activity_tracker_lib::run() {
        log::error!("activity tracker failed: {err:?}");
        eprintln!("activity tracker failed: {err:?}");
        std::process::exit(1);
    }
}
