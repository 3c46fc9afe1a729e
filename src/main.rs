fn main() -> anyhow::Result<()> {
    keylag_lib::run()
}
