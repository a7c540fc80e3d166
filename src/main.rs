fn main() -> Result<(), Box<dyn std::error::Error>> {
    loopmuse::runtime::run()
}
