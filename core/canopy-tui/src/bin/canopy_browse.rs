//! Thin entry point: `canopy-browse` is a standalone binary wrapping
//! `canopy_tui::run`, for users who don't want to go through `canopy browse`.

fn main() {
    if let Err(err) = canopy_tui::run() {
        eprintln!("canopy-browse: {err}");
        std::process::exit(1);
    }
}
