//! Version command implementation.

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() {
    println!("wardstone {VERSION}");
    println!();
    println!("Access decisions and certification for healthcare records.");
}
