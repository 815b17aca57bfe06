fn main() -> anyhow::Result<()> {
    eliot_downloader_lib::run()
}
