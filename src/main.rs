fn main() -> anyhow::Result<()> {
    js_injector::run()
}
