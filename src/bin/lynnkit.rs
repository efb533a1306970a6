use anyhow::Result;

fn main() -> Result<()> {
    lynnkit::cli::run()
}
