fn main() -> anyhow::Result<()> {
    seed_purity::cli::run()
}
