//! Display version information.

pub fn execute() -> Result<(), Box<dyn std::error::Error>> {
    println!("gatehouse {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
