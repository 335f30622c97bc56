fn main() -> anyhow::Result<()> {
	authgate_app::run()
}
