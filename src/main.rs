fn main() -> anyhow::Result<()> {
    posture_capture_lib::run()
}
